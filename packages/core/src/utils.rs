// ABOUTME: Shared utility functions for Estately
// ABOUTME: ID generation, upload naming and requirement key sanitizing

/// Generate a new document id
pub fn new_id() -> String {
    nanoid::nanoid!()
}

/// Extension of a file name without the dot, if it has one
pub fn file_extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Name an upload is stored under.
///
/// With an override the name becomes `{override}_{user_id}.{ext}`, so one user
/// re-uploading the same requirement overwrites their previous file while two
/// users never collide. Without one the original base name is kept.
pub fn storage_name(original: &str, override_name: Option<&str>, user_id: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);

    match override_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => match file_extension(base) {
            Some(ext) => format!("{}_{}.{}", name, user_id, ext),
            None => format!("{}_{}", name, user_id),
        },
        None => base.to_string(),
    }
}

/// Object-store key for an upload inside a project
pub fn object_key(project_id: &str, folder: &str, storage_name: &str) -> String {
    format!("project/{}/{}/{}", project_id, folder, storage_name)
}

/// Definition ids are the lowercased key with anything outside `[a-z0-9._-]` replaced
pub fn sanitize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("passport.pdf", Some("pdf"))]
    #[case("scan.final.JPG", Some("JPG"))]
    #[case("README", None)]
    #[case(".env", None)]
    #[case("trailing.", None)]
    fn test_file_extension(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(file_extension(name), expected);
    }

    #[test]
    fn test_storage_name_with_override() {
        assert_eq!(storage_name("My Passport.pdf", Some("ID"), "u1"), "ID_u1.pdf");
        assert_eq!(storage_name("My Passport.png", Some("ID"), "u1"), "ID_u1.png");
        assert_eq!(storage_name("My Passport.pdf", Some("ID"), "u2"), "ID_u2.pdf");
        assert_eq!(storage_name("noext", Some("ID"), "u1"), "ID_u1");
    }

    #[test]
    fn test_storage_name_without_override() {
        assert_eq!(storage_name("deed.pdf", None, "u1"), "deed.pdf");
        assert_eq!(storage_name("deed.pdf", Some("  "), "u1"), "deed.pdf");
        assert_eq!(storage_name("../../etc/deed.pdf", None, "u1"), "deed.pdf");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("p1", "user-files", "ID_u1.pdf"),
            "project/p1/user-files/ID_u1.pdf"
        );
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Passport Copy"), "passport_copy");
        assert_eq!(sanitize_key("energy-label.v2"), "energy-label.v2");
        assert_eq!(sanitize_key("Bewijs/Eigendom!"), "bewijs_eigendom_");
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
