// tests/integration/mod.rs - Integration test modules and shared output helpers

pub mod client;
pub mod fixtures;
pub mod seed;

/// Common test header
pub fn print_test_header(test_name: &str, emoji: &str) {
    println!("{} Testing {}...", emoji, test_name);
}

/// Common test success message
pub fn print_test_success(test_name: &str) {
    println!("✅ {} passed", test_name);
}
