//! Prelude for convenient imports.
//!
//! ```rust
//! use stencil::prelude::*;
//! use serde_json::json;
//!
//! let mut stencil = Stencil::new();
//! stencil.add_view("pages", Template::new("a.txt", "{x}")).unwrap();
//! assert_eq!(stencil.render_sync("a.txt", json!({"x": 1}).as_object()).unwrap(), "1");
//! ```

pub use crate::{
    Compiled, Context, Engine, Error, Settings, Stencil, Target, Template, ViewType,
};
