//! Classification of database errors.

/// Unique constraint guarding `urls.short_code`.
pub const SHORT_CODE_CONSTRAINT: &str = "urls_short_code_key";

/// Whether `e` is a unique violation on the short code constraint.
pub fn is_unique_violation_on_code(e: &sqlx::Error) -> bool {
    let Some(db_err) = e.as_database_error() else {
        return false;
    };

    if !db_err.is_unique_violation() {
        return false;
    }

    matches!(db_err.constraint(), Some(SHORT_CODE_CONSTRAINT))
}
