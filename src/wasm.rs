//! WASM bindings for Netforge Core.
//!
//! This module provides JavaScript-friendly bindings for compiling circuit
//! DSL text in the browser, e.g. behind a web editor's "compile" button.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCompilation } from 'netforge_core';
//!
//! await init();
//!
//! const source = `
//!   VoltageSource V1(9 V);
//!   Resistor R1(10k ohm);
//!   Connect(V1.positive, R1.positive);
//!   Connect(R1.negative, V1.negative, ground);
//!   Simulate { dc; };
//! `;
//!
//! const result = new WasmCompilation(source);
//! console.log(result.netlist());
//! console.log(result.errors());
//! ```

use wasm_bindgen::prelude::*;

use crate::compile::{compile, Compilation};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// A completed compilation, exposed to JavaScript.
///
/// Construction runs the whole pipeline; the accessors return the netlist
/// and diagnostic lists as newline-separated text.
#[wasm_bindgen]
pub struct WasmCompilation {
    inner: Compilation,
}

#[wasm_bindgen]
impl WasmCompilation {
    /// Compile a circuit DSL string.
    ///
    /// # Errors
    /// Rejects with a message when lexing or parsing fails; semantic
    /// problems are reported through [`errors`](Self::errors) and
    /// [`warnings`](Self::warnings) instead.
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Result<WasmCompilation, JsValue> {
        let inner = compile(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmCompilation { inner })
    }

    /// The netlist, one statement per line.
    pub fn netlist(&self) -> String {
        self.inner.netlist.join("\n")
    }

    /// Collected errors, one per line. Empty on a clean compile.
    pub fn errors(&self) -> String {
        self.inner
            .errors
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Collected warnings, one per line.
    pub fn warnings(&self) -> String {
        self.inner
            .warnings
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if the compilation produced no errors.
    pub fn is_clean(&self) -> bool {
        self.inner.is_clean()
    }
}
