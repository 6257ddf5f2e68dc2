// Functions with more than one way out.

use std::time::Instant;

// dd:log
pub fn classify(n: i32) -> &'static str {
    if n < 0 {
        return "negative";
    }
    if n == 0 {
        return "zero";
    }
    "positive"
}

// Divides, refusing a zero divisor.
// dd:log
pub fn checked_div(a: i32, b: i32) -> i32 {
    if b == 0 {
        panic!("division by zero");
    }
    a / b
}

// dd:log
pub fn step(label: &str) {
    tracing::info!(label, "step body");
}

pub fn millis_since(start: Instant) -> u128 {
    start.elapsed().as_millis()
}
