mod collect_tests;
mod common;
mod measurement_tests;
mod url_tests;
