pub mod range_bar;
