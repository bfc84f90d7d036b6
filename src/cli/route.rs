//! CLI route: builds the run context and drives one invocation end to end.

use crate::cli::output::{write_commentary, write_diagnostic};
use crate::cli::parse::Cli;
use crate::config::{ConfigLoader, TulpConfig};
use crate::engine::{Engine, EngineSettings, RunReport};
use crate::error::TulpError;
use crate::execution::{InterpreterRunner, ProgramRunner};
use crate::exit_codes;
use crate::input::{prompt_for_request, read_stdin, resolve_request, StdinInput};
use crate::inspect::Inspector;
use crate::output::{OutputTarget, OutputWriter};
use crate::provider::{LlmClient, ProviderRegistry};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime context for one invocation: the validated configuration and the provider
/// registry. Built once from the CLI using ConfigLoader only.
pub struct RunContext {
    config: TulpConfig,
    registry: ProviderRegistry,
    quiet: bool,
}

impl RunContext {
    /// Load configuration layers, apply CLI overrides and validate.
    pub fn new(cli: &Cli) -> Result<Self, TulpError> {
        let mut config = ConfigLoader::load(cli.config.as_deref())?;
        config.apply_overrides(&cli.overrides());
        let mut context = Self::from_config(config)?;
        context.quiet = cli.quiet;
        Ok(context)
    }

    pub fn from_config(config: TulpConfig) -> Result<Self, TulpError> {
        config
            .validate()
            .map_err(|errors| TulpError::ConfigError(errors.join("; ")))?;
        Ok(Self {
            config,
            registry: ProviderRegistry::with_builtin_providers()?,
            quiet: false,
        })
    }

    pub fn config(&self) -> &TulpConfig {
        &self.config
    }

    /// Execute one invocation and return the process exit code.
    pub async fn execute(&self, cli: &Cli) -> Result<i32, TulpError> {
        let mut stdout = std::io::stdout();
        let mut stderr = std::io::stderr();

        if cli.list_models {
            writeln!(stdout, "Supported models:\n{}", self.registry.describe())?;
            return Ok(exit_codes::SUCCESS);
        }
        if cli.show_config {
            let rendered = toml::to_string_pretty(&self.config.redacted())
                .map_err(|e| TulpError::ConfigError(format!("Cannot render config: {}", e)))?;
            write!(stdout, "{}", rendered)?;
            return Ok(exit_codes::SUCCESS);
        }

        let (input, request) = read_input_and_request(cli.request.clone(), read_stdin).await?;

        let client = self.registry.create_client(&self.config)?;
        let runner = Arc::new(InterpreterRunner::new(self.config.interpreter.clone()));
        let engine = self.build_engine(client, runner);
        self.run_with_engine(&engine, &request, input.text(), &mut stdout, &mut stderr)
            .await
    }

    /// Engine wired from this context's configuration.
    pub fn build_engine(
        &self,
        client: Arc<dyn LlmClient>,
        runner: Arc<dyn ProgramRunner>,
    ) -> Engine {
        info!(
            provider = client.provider_name(),
            model = client.model_name(),
            "Using model"
        );
        let inspector = self.config.inspect_dir.as_deref().and_then(|dir| {
            Inspector::open(dir)
                .map_err(|e| warn!(error = %e, "Inspection disabled"))
                .ok()
                .map(Arc::new)
        });
        Engine::new(EngineSettings::from_config(&self.config), client, runner)
            .with_inspector(inspector)
    }

    /// Run the engine and deliver its report to the sinks.
    pub async fn run_with_engine<O: Write, E: Write>(
        &self,
        engine: &Engine,
        request: &str,
        input: &str,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<i32, TulpError> {
        debug!(request, "Running request");
        let report = engine.run(request, input).await?;
        self.deliver(&report, stdout, stderr)
    }

    fn deliver<O: Write, E: Write>(
        &self,
        report: &RunReport,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<i32, TulpError> {
        let mut exit_code = report.exit_code();

        let delivered = match (&report.generated_program, &self.config.write_file) {
            // Execution mode: the program goes to the file, its output to stdout
            (Some(program), Some(path)) => {
                let written = OutputWriter::write_to_file(path, program).map(|backup| {
                    info!(path = %path.display(), backup = ?backup, "Generated program saved");
                });
                OutputTarget::Stdout.emit(&report.output, stdout)?;
                written
            }
            _ => OutputTarget::from_option(self.config.write_file.as_deref())
                .emit(&report.output, stdout),
        };
        if let Err(e) = delivered {
            write_diagnostic(stderr, &e.to_string())?;
            exit_code = exit_code.max(exit_codes::BACKEND_ERROR);
        }

        if !self.quiet {
            write_commentary(stderr, &report.commentary)?;
        }
        if let Some(diagnostic) = &report.diagnostic {
            write_diagnostic(stderr, diagnostic)?;
        }
        Ok(exit_code)
    }
}

/// Read stdin and settle the request on the blocking pool; both may wait on a terminal.
async fn read_input_and_request<F>(
    words: Vec<String>,
    read: F,
) -> Result<(StdinInput, String), TulpError>
where
    F: FnOnce() -> Result<StdinInput, TulpError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<(StdinInput, String), TulpError> {
        let input = read()?;
        let request = resolve_request(&words, &input, || {
            let stdin = std::io::stdin();
            prompt_for_request(&mut stdin.lock(), &mut std::io::stderr())
        })?;
        Ok((input, request))
    })
    .await
    .map_err(|e| TulpError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}
