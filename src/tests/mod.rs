pub mod support;

pub mod db_tests;
pub mod scanner_tests;
