//! Shared test utilities

use intake_gateway::DbPool;
use intake_gateway::db::{self, Profile, ProfileRepo};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a test profile
pub fn create_profile(
    db: &DbPool,
    first_name: &str,
    phone: Option<&str>,
    display_name: Option<&str>,
) -> Profile {
    ProfileRepo::new(db.clone())
        .create(first_name, phone, display_name)
        .expect("failed to create test profile")
}
