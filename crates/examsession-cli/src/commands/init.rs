//! The `examsession init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create examsession.toml
    if std::path::Path::new("examsession.toml").exists() {
        println!("examsession.toml already exists, skipping.");
    } else {
        std::fs::write("examsession.toml", SAMPLE_CONFIG)?;
        println!("Created examsession.toml");
    }

    // Create example plan
    std::fs::create_dir_all("plans")?;
    let example_path = std::path::Path::new("plans/example.toml");
    if example_path.exists() {
        println!("plans/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_PLAN)?;
        println!("Created plans/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit examsession.toml with your service URL and token");
    println!("  2. Run: examsession validate --plan plans/example.toml");
    println!("  3. Run: examsession run --plan plans/example.toml --offline");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examsession configuration

base_url = "http://localhost:8080/api/v1"
api_token = "${EXAMSESSION_TOKEN}"
request_timeout_secs = 30
# submit_timeout_secs = 20

duration_secs = 10800
user_id = "anonymous"
output_dir = "./examsession-results"
"#;

const EXAMPLE_PLAN: &str = r#"[exam]
id = "example"
name = "Example exam"
duration_secs = 600

[[subjects]]
id = "math"
name = "Mathematics"
mandatory = true

[[subjects]]
id = "geography"
name = "Geography"

[[questions]]
id = "math-1"
subject = "math"
prompt = "What is 7 * 8?"
options = ["54", "56", "64"]
correct = 1

[[questions]]
id = "math-2"
subject = "math"
prompt = "What is the square root of 81?"
options = ["8", "9", "7"]
correct = 1

[[questions]]
id = "geo-1"
subject = "geography"
prompt = "Which is the longest river?"
options = ["Nile", "Volga", "Danube"]
correct = 0
"#;
