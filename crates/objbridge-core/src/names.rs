//! Name helpers shared by the registries.

/// Strip any dotted module prefix from a type name.
///
/// `"pkg.module.Type"` becomes `"Type"`; names without a dot are returned as-is.
pub fn strip_module(type_name: &str) -> &str {
    match type_name.rfind('.') {
        Some(pos) => &type_name[pos + 1..],
        None => type_name,
    }
}

/// Whether `name` is a legal scripting identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Native class names of templated classes are often mangled run-time type
/// names that fail this check.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The final dotted component of a module path.
///
/// A leading dot (relative import) is dropped as well: `".mod"` gives `"mod"`.
pub fn module_basename(full_name: &str) -> &str {
    strip_module(full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_module_removes_prefix() {
        assert_eq!(strip_module("vtkmodules.vtkCommonCore.vtkObject"), "vtkObject");
        assert_eq!(strip_module("Plain"), "Plain");
        assert_eq!(strip_module("trailing."), "");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("vtkObject"));
        assert!(is_identifier("_private1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("N3vtk5ArrayIiEE<int>"));
        assert!(!is_identifier("has space"));
    }

    #[test]
    fn module_basename_handles_relative_names() {
        assert_eq!(module_basename("pkg.sub.mod"), "mod");
        assert_eq!(module_basename(".mod"), "mod");
        assert_eq!(module_basename("mod"), "mod");
    }
}
