
mod decode_tests;
mod store_tests;
