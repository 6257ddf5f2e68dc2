// Sample input for `tracemark demos/demo.rs`. The generated file needs the
// `tracing` and `tracing-subscriber` (with `json`) crates to build.

use std::thread;
use std::time::Duration;

//dd:log
fn calculate_sum(a: i32, b: i32) -> i32 {
    thread::sleep(Duration::from_millis(50));
    a + b
}

//dd:log
fn process_data(name: &str, items: &[String]) -> Result<(), String> {
    thread::sleep(Duration::from_millis(100));
    if items.is_empty() {
        return Err(format!("no items to process for {name}"));
    }
    println!("Processed {} items for {name}", items.len());
    Ok(())
}

//dd:log
fn simple_operation() {
    thread::sleep(Duration::from_millis(25)); // Simulate work
    println!("Simple operation completed");
}

fn main() {
    println!("Hello from the demo");

    let result = calculate_sum(10, 20);
    println!("Sum: {result}");

    let items: Vec<String> = ["item1", "item2", "item3"].map(String::from).into();
    if let Err(err) = process_data("demo", &items) {
        println!("Error: {err}");
    }

    simple_operation();
}
