//! Output variable declarations.
//!
//! Output variables are declared exactly once per run, on the first
//! processed step. [`ResultSchemaRegistry`] remembers what was declared
//! so later steps only write.

use divcurl_core::Shape;
use indexmap::IndexMap;

/// Outcome of [`ResultSchemaRegistry::declare_once`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Declaration {
    /// First declaration; the caller must define the variable on its sink.
    Declared,
    /// Already declared earlier in the run; nothing to do.
    AlreadyDeclared,
}

/// Global shape and this worker's block of one output variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableLayout {
    /// Shape of the full output array.
    pub global_shape: Shape,
    /// Offset of this worker's block.
    pub start: Shape,
    /// Extent of this worker's block.
    pub count: Shape,
}

/// Output variables declared so far, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ResultSchemaRegistry {
    declared: IndexMap<String, VariableLayout>,
}

impl ResultSchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` unless it is already known.
    ///
    /// A repeated declaration keeps the first layout.
    pub fn declare_once(
        &mut self,
        name: &str,
        global_shape: &[usize],
        start: &[usize],
        count: &[usize],
    ) -> Declaration {
        if self.declared.contains_key(name) {
            return Declaration::AlreadyDeclared;
        }
        self.declared.insert(
            name.to_string(),
            VariableLayout {
                global_shape: global_shape.iter().copied().collect(),
                start: start.iter().copied().collect(),
                count: count.iter().copied().collect(),
            },
        );
        Declaration::Declared
    }

    /// Whether `name` has been declared.
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    /// Layout recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&VariableLayout> {
        self.declared.get(name)
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    /// Whether nothing has been declared yet.
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Declared variables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableLayout)> {
        self.declared.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divcurl_core::DERIVED_NAMES;

    #[test]
    fn second_declaration_is_a_no_op() {
        let mut reg = ResultSchemaRegistry::new();
        assert_eq!(
            reg.declare_once("Div", &[1, 8, 8], &[0, 0, 4], &[1, 8, 4]),
            Declaration::Declared
        );
        assert_eq!(
            reg.declare_once("Div", &[1, 8, 9], &[0, 0, 0], &[1, 8, 9]),
            Declaration::AlreadyDeclared
        );
        let layout = reg.get("Div").unwrap();
        assert_eq!(layout.global_shape.as_slice(), &[1, 8, 8]);
        assert_eq!(layout.start.as_slice(), &[0, 0, 4]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn keeps_declaration_order() {
        let mut reg = ResultSchemaRegistry::new();
        assert!(reg.is_empty());
        for name in DERIVED_NAMES.iter().rev() {
            reg.declare_once(name, &[4, 4], &[0, 0], &[4, 4]);
        }
        let names: Vec<_> = reg.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Curl_z", "Curl_y", "Curl_x", "Div"]);
        assert!(reg.is_declared("Curl_x"));
        assert!(!reg.is_declared("ux"));
    }
}
