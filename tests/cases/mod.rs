use std::path::PathBuf;

pub use self::test_utils::TestCase;
use anyhow::Context;

mod test_utils;

pub fn read_test_case(name: &str) -> anyhow::Result<TestCase> {
    let path = if name.starts_with("tests") {
        PathBuf::from(name)
    } else {
        PathBuf::from("tests").join("cases").join(name)
    };
    let input = std::fs::read_to_string(&path)
        .with_context(|| format!("reading test case {}", path.display()))?;
    test_utils::parse_test_case(&input.replace("\r\n", "\n"))
        .with_context(|| format!("parsing test case {}", path.display()))
}

pub fn run_test_cases(dir: &str) -> anyhow::Result<()> {
    let dir = PathBuf::from("tests").join("cases").join(dir);
    let mut names = std::fs::read_dir(&dir)?
        .map(|res| res.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    for name in names {
        let test_case = read_test_case(dir.join(&name).to_string_lossy().as_ref())?;
        test_case
            .run()
            .with_context(|| format!("Test case: {:?}", name))?;
    }

    Ok(())
}
