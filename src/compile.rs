use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt, fs, io,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use serde::{Deserialize, Serialize};

// -------------------- Errors -------------------- //

/// Failure modes of a contract build, one variant per stage so that callers
/// can tell a broken source apart from a missing toolchain or a missing
/// contract name.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("source file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },
    #[error("could not read source file {}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "cannot find the `solc` executable. Try installing it by following \
         https://docs.soliditylang.org/en/latest/installing-solidity.html."
    )]
    SolcNotFound,
    #[error("could not run `solc --standard-json`")]
    SolcInvocation(#[source] io::Error),
    #[error("`solc` exited unsuccessfully: {stderr}")]
    SolcExit { stderr: String },
    #[error("could not decode the compiler output")]
    MalformedOutput(#[from] serde_json::Error),
    #[error("compilation failed:\n{}", format_diagnostics(.diagnostics))]
    CompilationFailed { diagnostics: Vec<Diagnostic> },
    #[error(
        "contract '{contract}' does not exist in the compiled output of {file}.{}",
        did_you_mean(.closest)
    )]
    ContractNotFound {
        contract: String,
        file: String,
        closest: Vec<String>,
    },
}

/// Render the error diagnostics for [`CompileError::CompilationFailed`], one
/// per line.
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the suggestion part of [`CompileError::ContractNotFound`].
fn did_you_mean(closest: &[String]) -> String {
    match closest {
        [] => String::new(),
        [single] => format!("\nPerhaps you meant '{}'?", single),
        _ => {
            let list = closest
                .iter()
                .map(|candidate| format!("'{}'", candidate))
                .collect::<Vec<_>>()
                .join(", ");
            format!("\nPerhaps you meant one of [{}].", list)
        }
    }
}

// -------------------- Compiler Interface -------------------- //

/// The standard-JSON request handed to `solc` on stdin.
#[derive(Debug, Serialize)]
struct CompilerInput {
    language: &'static str,
    sources: BTreeMap<String, SourceFile>,
    settings: Settings,
}

#[derive(Debug, Serialize)]
struct SourceFile {
    content: String,
}

#[derive(Debug, Serialize)]
struct Settings {
    #[serde(rename = "outputSelection")]
    output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl CompilerInput {
    /// Request every output artifact for every contract in the given source,
    /// keyed by `file` in the source map.
    fn single_source(file: String, content: String) -> Self {
        let mut contract_outputs = BTreeMap::new();
        contract_outputs.insert("*".to_string(), vec!["*".to_string()]);
        let mut output_selection = BTreeMap::new();
        output_selection.insert("*".to_string(), contract_outputs);

        let mut sources = BTreeMap::new();
        sources.insert(file, SourceFile { content });

        Self {
            language: "Solidity",
            sources,
            settings: Settings { output_selection },
        }
    }
}

/// The standard-JSON response read from `solc` stdout. Only the parts this
/// tool consumes are modelled; everything else is ignored.
#[derive(Debug, Deserialize)]
struct CompilerOutput {
    #[serde(default)]
    errors: Vec<Diagnostic>,
    #[serde(default)]
    contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

#[derive(Debug, Deserialize)]
struct ContractOutput {
    abi: serde_json::Value,
    evm: EvmOutput,
}

#[derive(Debug, Deserialize)]
struct EvmOutput {
    bytecode: BytecodeOutput,
}

#[derive(Debug, Deserialize)]
struct BytecodeOutput {
    object: String,
}

/// Severity of a compiler diagnostic. Only `error` is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// A single entry of the compiler's `errors` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub component: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // The formatted message carries the source location and a code
        // excerpt, so prefer it when the compiler supplied one.
        match &self.formatted_message {
            Some(formatted) => f.write_str(formatted.trim_end()),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

// -------------------- Artifact -------------------- //

/// The compiled representation of one contract: its interface descriptor and
/// creation bytecode, ready to be deployed.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledContract {
    /// Name of the contract within its source file.
    pub contract: String,
    /// Interface descriptor list enumerating the callable surface. Kept as
    /// an opaque JSON value.
    pub abi: serde_json::Value,
    /// Hex encoded creation bytecode.
    pub bytecode: String,
    /// Non-fatal diagnostics emitted while compiling. Not part of the
    /// serialized artifact.
    #[serde(skip)]
    pub warnings: Vec<Diagnostic>,
}

impl CompiledContract {
    /// Decode the creation bytecode into raw bytes.
    ///
    /// Fails for modules with unlinked library placeholders, which are not
    /// valid hex.
    pub fn bytecode_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.bytecode)
    }
}

// -------------------- Helper Functions -------------------- //

/// Check that the `solc` executable is installed and return its path.
pub fn check_solc() -> Result<PathBuf, CompileError> {
    which::which("solc").map_err(|_| CompileError::SolcNotFound)
}

/// Hand the serialized input to `solc --standard-json` on stdin and parse
/// the response. The compiler reports broken sources inside the response,
/// not through its exit code, so a non-zero exit means the invocation itself
/// went wrong.
fn run_solc(solc: &Path, input: &CompilerInput) -> Result<CompilerOutput, CompileError> {
    let request = serde_json::to_vec(input)?;
    let mut child = Command::new(solc)
        .arg("--standard-json")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(CompileError::SolcInvocation)?;
    child
        .stdin
        .take()
        .ok_or_else(|| {
            CompileError::SolcInvocation(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "no stdin handle for the compiler process",
            ))
        })?
        .write_all(&request)
        .map_err(CompileError::SolcInvocation)?;
    let output = child
        .wait_with_output()
        .map_err(CompileError::SolcInvocation)?;
    if !output.status.success() {
        return Err(CompileError::SolcExit {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Find the strings in `list` closest to `goal` according to the optimal
/// string alignment distance. If an exact match is found `None` is returned,
/// otherwise `Some` with the closest candidates.
fn find_closest<'a>(list: impl IntoIterator<Item = &'a str>, goal: &str) -> Option<Vec<&'a str>> {
    let mut out = Vec::new();
    let mut least = usize::MAX;
    for candidate in list {
        let dist = strsim::osa_distance(candidate, goal);
        if dist == 0 {
            return None;
        }
        match dist.cmp(&least) {
            Ordering::Less => {
                out.clear();
                out.push(candidate);
                least = dist;
            }
            Ordering::Equal => {
                out.push(candidate);
            }
            Ordering::Greater => {
                // do nothing since this candidate is not useful
            }
        }
    }
    Some(out)
}

// -------------------- Export Functions -------------------- //

/// Compile the contract named `contract_name` from the source file at
/// `source_path` and return its deployment artifact.
///
/// The compiler is invoked exactly once. Diagnostics of severity `error`
/// abort the build with [`CompileError::CompilationFailed`]; warnings are
/// returned as part of the artifact so the caller can decide how to surface
/// them. Constructor arguments are a deployment concern and never enter the
/// compiler invocation.
pub fn compile_contract(
    source_path: &Path,
    contract_name: &str,
) -> Result<CompiledContract, CompileError> {
    let source = fs::read_to_string(source_path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            CompileError::SourceNotFound {
                path: source_path.to_path_buf(),
            }
        } else {
            CompileError::SourceUnreadable {
                path: source_path.to_path_buf(),
                source: err,
            }
        }
    })?;
    let solc = check_solc()?;

    // The source map is keyed by the file name, which is also the key the
    // compiler uses for this file in its response.
    let file = match source_path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => source_path.display().to_string(),
    };
    let input = CompilerInput::single_source(file.clone(), source);
    let output = run_solc(&solc, &input)?;

    let (errors, warnings): (Vec<_>, Vec<_>) = output
        .errors
        .into_iter()
        .partition(|diagnostic| diagnostic.severity == Severity::Error);
    if !errors.is_empty() {
        return Err(CompileError::CompilationFailed {
            diagnostics: errors,
        });
    }

    let mut contracts = output.contracts;
    let artifact = contracts
        .get_mut(&file)
        .and_then(|file_contracts| file_contracts.remove(contract_name));
    let artifact = match artifact {
        Some(artifact) => artifact,
        None => {
            let available = contracts
                .values()
                .flat_map(|file_contracts| file_contracts.keys().map(String::as_str));
            let closest = find_closest(available, contract_name)
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect();
            return Err(CompileError::ContractNotFound {
                contract: contract_name.to_string(),
                file,
                closest,
            });
        }
    };

    Ok(CompiledContract {
        contract: contract_name.to_string(),
        abi: artifact.abi,
        bytecode: artifact.evm.bytecode.object,
        warnings,
    })
}
