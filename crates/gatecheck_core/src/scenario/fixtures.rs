//! Ids, claim sets and data shared by the standard suites.

use crate::engine::FetchWindow;
use crate::token::ClaimSet;

pub const APP_ID: &str = "APP01";
pub const SHEET_ID: &str = "SHEET01";
pub const MOVIES_OBJECT_ID: &str = "MOVIES01";
/// App name an identity without create rights tries to create.
pub const FORBIDDEN_APP: &str = "CannotCreateThisApp";

/// Load script for the movies data set on the reload engine.
pub const MOVIES_SCRIPT: &str =
    "LOAD * FROM '/data/movies.csv' (txt, embedded labels, delimiter is ',', no quotes);";
pub const MOVIES_FIELDS: [&str; 4] = ["Movie", "Year", "Adjusted Cost", "Image"];
pub const MOVIES_WINDOW: FetchWindow = FetchWindow {
    height: 50,
    width: 4,
};
/// Row 1 of the movies object after a reload.
pub const MOVIES_ROW: (usize, &str, f64) = (1, "Armageddon", 1998.0);

pub fn admin() -> ClaimSet {
    ClaimSet::subject("someAdminUser").with_list("roles", &["admin"])
}

pub fn non_admin() -> ClaimSet {
    ClaimSet::subject("someNonAdminUser")
}

pub fn create_user() -> ClaimSet {
    ClaimSet::subject("someCreateUser").with("allowCreate", true)
}

pub fn reload_user() -> ClaimSet {
    ClaimSet::subject("someReloadUser").with("allowReload", true)
}

pub fn view_user() -> ClaimSet {
    ClaimSet::subject("someViewUser").with("allowView", true)
}

/// Identity of the basic access check.
pub fn basic_user() -> ClaimSet {
    ClaimSet::subject("user1").with_list("groups", &["A", "B"])
}
