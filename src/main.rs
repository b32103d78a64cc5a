use anyhow::Context;
use clap::AppSettings;
use std::{
    fs,
    path::{Path, PathBuf},
};
use structopt::StructOpt;
use token_build::compile::compile_contract;

#[derive(Debug, StructOpt)]
#[structopt(about = "Tool for building the Token smart contract into a deployable artifact.")]
enum Command {
    #[structopt(
        name = "build",
        about = "Compile a contract source file and export the ABI and creation bytecode of one \
                 named contract."
    )]
    Build(BuildOptions),
}

#[derive(Debug, StructOpt)]
struct BuildOptions {
    #[structopt(
        name = "source",
        long = "source",
        short = "s",
        default_value = "contracts/Token.sol",
        help = "Path to the contract source file to compile."
    )]
    source:   PathBuf,
    #[structopt(
        name = "contract",
        long = "contract",
        short = "c",
        default_value = "Token",
        help = "Name of the contract to export from the compiled output."
    )]
    contract: String,
    #[structopt(
        name = "out",
        long = "out",
        short = "o",
        default_value = "-",
        help = "Path and filename to write the artifact to or use the default value `-` to print \
                the artifact to the console (expected input: `./my/path/Token.json` or `-`)."
    )]
    out:      PathBuf,
}

const WARNING_STYLE: ansi_term::Color = ansi_term::Color::Yellow;

pub fn main() -> anyhow::Result<()> {
    #[cfg(target_os = "windows")]
    {
        ansi_term::enable_ansi_support();
    }
    let cmd = {
        let app = Command::clap()
            .setting(AppSettings::ArgRequiredElseHelp)
            .global_setting(AppSettings::ColoredHelp);
        let matches = app.get_matches();
        Command::from_clap(&matches)
    };
    match cmd {
        Command::Build(options) => handle_build(options),
    }
}

/// Compile the requested contract once and emit its artifact. Compiler
/// warnings go to stderr; the artifact goes to `--out` or stdout.
fn handle_build(options: BuildOptions) -> anyhow::Result<()> {
    let success_style = ansi_term::Color::Green.bold();
    let bold_style = ansi_term::Style::new().bold();

    let compiled = compile_contract(&options.source, &options.contract).with_context(|| {
        format!(
            "Could not build contract '{}' from {}.",
            options.contract,
            options.source.display()
        )
    })?;

    for warning in &compiled.warnings {
        eprintln!("{}", WARNING_STYLE.paint(warning.to_string()));
    }

    let artifact = serde_json::to_string_pretty(&compiled)
        .context("Could not serialize the compiled artifact.")?;
    if options.out.as_path() == Path::new("-") {
        println!("{}", artifact);
    } else {
        // A path and a filename need to be provided when using the `--out` flag.
        if options.out.file_name().is_none() || options.out.is_dir() {
            anyhow::bail!(
                "The `--out` flag requires a path and a filename (expected input: \
                 `./my/path/Token.json`) or `-`."
            );
        }
        if let Some(out_dir) = options.out.parent() {
            fs::create_dir_all(out_dir)
                .context("Unable to create directory for the resulting artifact.")?;
        }
        fs::write(&options.out, artifact).context("Unable to write final artifact.")?;
    }

    let bytecode_len = compiled.bytecode.len() / 2;
    let size = format!("{}.{:03} kB", bytecode_len / 1000, bytecode_len % 1000);
    eprintln!(
        "    {} contract {} {}",
        success_style.paint("Finished"),
        bold_style.paint(options.contract.as_str()),
        bold_style.paint(size)
    );
    Ok(())
}
