//! Script templates with typed placeholder substitution.

use std::marker::PhantomData;

/// Values for the placeholders of one template.
pub trait TemplateVars {
    /// `(placeholder, value)` pairs. Values are inserted as JS string literals.
    fn values(&self) -> Vec<(&'static str, String)>;
}

/// Embedded script whose placeholders are filled from `V`.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _vars: PhantomData<V>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _vars: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.values()
            .into_iter()
            .fold(self.content.to_owned(), |out, (placeholder, value)| {
                out.replace(placeholder, &js_string(&value))
            })
    }
}

/// Quote `value` as a JSON string, which is also a valid JS string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
