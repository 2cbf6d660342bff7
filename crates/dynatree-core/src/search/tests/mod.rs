mod config_tests;
mod engine_tests;
mod inference_tests;
mod variant_tests;
