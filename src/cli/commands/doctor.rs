//! Doctor command - verify credentials and configuration.

use crate::cli::Output;
use crate::config::{
    Deployment, EnvVars, Settings, BQ_DATASET_ID, BQ_TABLE_ID, DATA_STORE_ID,
    VERTEX_AI_SEARCH_DATASTORE,
};
use crate::gcp::{http_client, Credentials};
use crate::search::DataStorePath;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Spendscope Doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let env = EnvVars::from_process();
    let mut checks = Vec::new();

    println!("{}", style("Google Cloud").bold());
    let credential_checks = check_credentials(&env).await;
    for check in &credential_checks.0 {
        check.print();
    }
    checks.extend(credential_checks.0);

    println!();

    println!("{}", style("Deployment").bold());
    let project_id = credential_checks.1.unwrap_or_else(|| "<unknown-project>".to_string());
    let deployment = Deployment::resolve(&env, &project_id);
    let deployment_checks = check_deployment(&deployment);
    for check in &deployment_checks {
        check.print();
    }
    checks.extend(deployment_checks);
    Output::kv("Model", &deployment.model_name);
    Output::kv("Model location", &settings.model.location);
    Output::kv("BigQuery location", &deployment.bq_location);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using spendscope.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Spendscope is ready to use.");
    }

    Ok(())
}

/// Discover credentials and try to mint a token. Returns the project on success.
async fn check_credentials(env: &EnvVars) -> (Vec<CheckResult>, Option<String>) {
    let hint = "Run: gcloud auth application-default login (or set GOOGLE_APPLICATION_CREDENTIALS)";

    let http = match http_client() {
        Ok(http) => http,
        Err(e) => return (vec![CheckResult::error("HTTP client", &e.to_string(), hint)], None),
    };

    let credentials = match Credentials::discover(env, http).await {
        Ok(credentials) => credentials,
        Err(e) => return (vec![CheckResult::error("Credentials", &e.to_string(), hint)], None),
    };

    let mut results = vec![
        CheckResult::ok(
            "Credentials",
            &format!("{} from {}", credentials.kind, credentials.source),
        ),
        CheckResult::ok("Project", &credentials.project_id),
    ];

    match credentials.token_provider().access_token().await {
        Ok(_) => results.push(CheckResult::ok("Access token", "obtained")),
        Err(e) => results.push(CheckResult::error("Access token", &e.to_string(), hint)),
    }

    (results, Some(credentials.project_id))
}

/// Check the values the agent cannot start without.
fn check_deployment(deployment: &Deployment) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, value) in [
        (BQ_DATASET_ID, &deployment.dataset_id),
        (BQ_TABLE_ID, &deployment.table_id),
    ] {
        results.push(match value {
            Some(v) => CheckResult::ok(name, v),
            None => CheckResult::error(name, "not set", &format!("Set with: export {}=...", name)),
        });
    }

    let datastore_name = "Datastore";
    results.push(match &deployment.datastore_path {
        Some(path) => match path.parse::<DataStorePath>() {
            Ok(_) => CheckResult::ok(datastore_name, path),
            Err(e) => CheckResult::error(
                datastore_name,
                &e.to_string(),
                &format!("Fix {} or set {} instead", VERTEX_AI_SEARCH_DATASTORE, DATA_STORE_ID),
            ),
        },
        None => CheckResult::error(
            datastore_name,
            "not configured",
            &format!("Set {} or {}", DATA_STORE_ID, VERTEX_AI_SEARCH_DATASTORE),
        ),
    });

    results
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        match Settings::load_from(Some(&config_path.to_path_buf())) {
            Ok(_) => CheckResult::ok("Config file", &format!("{}", config_path.display())),
            Err(e) => CheckResult::error(
                "Config file",
                &e.to_string(),
                "Fix the file or remove it to use defaults",
            ),
        }
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: spendscope config edit",
        )
    }
}
