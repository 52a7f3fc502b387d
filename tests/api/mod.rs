mod auth_tests;
mod health_tests;
mod permission_tests;
