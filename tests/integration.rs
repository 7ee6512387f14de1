mod cases;
use cases::{read_test_case, run_test_cases};

#[test]
fn command_test_cases() -> Result<(), Box<dyn std::error::Error>> {
    Ok(run_test_cases("commands")?)
}

#[test]
fn block_test_cases() -> Result<(), Box<dyn std::error::Error>> {
    Ok(run_test_cases("blocks")?)
}

#[test]
fn simple() -> Result<(), Box<dyn std::error::Error>> {
    let test_case = read_test_case("simple.md")?;
    test_case.run()?;
    Ok(())
}
