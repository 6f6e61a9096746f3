//! Deterministic artifact naming for per-exam files.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::ExamMetadata;

/// Characters that are unsafe in filenames on at least one platform.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"[<>:"/\\|?*]"#).expect("static filename pattern is valid")
});

/// Replaces unsafe filename characters with an underscore.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

/// Builds the artifact stem for one exam (no extension).
///
/// The stem starts with the exam ID followed by an underscore; the resume
/// predicate relies on that prefix. Distinct exam IDs therefore map to
/// non-colliding artifact names by construction.
#[must_use]
pub fn artifact_stem(metadata: &ExamMetadata) -> String {
    sanitize_filename(&format!(
        "{}_{}_{}_{}",
        metadata.exam_id, metadata.exam_name, metadata.level_name, metadata.subject_name
    ))
}
