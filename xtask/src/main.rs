//! Build automation for k8slocal
//!
//! Usage: cargo xtask <command>
//!
//! Available commands:
//! - build: Build the project
//! - test: Run tests
//! - smoke: Run the release binary against a throwaway home
//! - dist: Create distribution packages
//! - install: Install to system
//! - ci: Run CI checks

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BIN: &str = "k8slocal";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for k8slocal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Exercise the CLI commands that need no provider tooling
    Smoke,
    /// Create distribution packages
    Dist {
        /// Target triple (e.g., x86_64-unknown-linux-gnu)
        #[arg(long)]
        target: Option<String>,
    },
    /// Install to system
    Install {
        /// Installation prefix (default: /usr/local)
        #[arg(long, default_value = "/usr/local")]
        prefix: String,
    },
    /// Run CI checks (format, clippy, test, smoke)
    Ci,
    /// Format code
    Format {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root());

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test { integration } => test(&sh, integration),
        Commands::Smoke => smoke(&sh),
        Commands::Dist { target } => dist(&sh, target),
        Commands::Install { prefix } => install(&sh, &prefix),
        Commands::Ci => ci(&sh),
        Commands::Format { check } => format(&sh, check),
        Commands::Clippy => clippy(&sh),
    }
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}...", BIN);

    if release {
        cmd!(sh, "cargo build --release --bin {BIN}").run()?;
        println!("✅ Release build completed: target/release/{}", BIN);
    } else {
        cmd!(sh, "cargo build --bin {BIN}").run()?;
        println!("✅ Debug build completed: target/debug/{}", BIN);
    }

    Ok(())
}

fn test(sh: &Shell, integration: bool) -> Result<()> {
    println!("🧪 Running tests...");

    if integration {
        cmd!(sh, "cargo test -p {BIN} --test '*'").run()?;
    } else {
        cmd!(sh, "cargo test --all").run()?;
    }

    println!("✅ All tests passed");
    Ok(())
}

fn smoke(sh: &Shell) -> Result<()> {
    println!("💨 Smoke testing {}...", BIN);
    build(sh, true)?;

    let binary = project_root().join("target/release").join(BIN);
    let home = sh.create_temp_dir()?;
    let home = home.path();

    cmd!(sh, "{binary} --home {home} provider list").run()?;
    cmd!(sh, "{binary} --home {home} provider set kind").run()?;

    let config = sh.read_file(home.join("config.yaml"))?;
    if config.trim() != "provider: kind" {
        bail!("unexpected config after 'provider set kind': {}", config.trim());
    }

    if cmd!(sh, "{binary} --home {home} cluster create Not_Valid")
        .quiet()
        .ignore_stderr()
        .run()
        .is_ok()
    {
        bail!("an invalid cluster name was accepted");
    }

    println!("✅ Smoke test passed");
    Ok(())
}

fn dist(sh: &Shell, target: Option<String>) -> Result<()> {
    println!("📦 Creating distribution package...");

    let target_triple = match target {
        Some(target_triple) => {
            cmd!(sh, "cargo build --release --bin {BIN} --target {target_triple}").run()?;
            target_triple
        }
        None => {
            cmd!(sh, "cargo build --release --bin {BIN}").run()?;
            host_triple(sh)?
        }
    };

    let dist_dir = project_root().join("dist");
    sh.create_dir(&dist_dir)?;

    let target_dir = project_root().join("target").join(&target_triple).join("release");
    let binary_src = if target_dir.join(BIN).exists() {
        target_dir.join(BIN)
    } else {
        project_root().join("target/release").join(BIN)
    };
    sh.copy_file(&binary_src, dist_dir.join(BIN))?;

    // Matches the binstall pkg-url in Cargo.toml.
    let archive_name = format!("{}-{}.tar.gz", BIN, target_triple);
    cmd!(sh, "tar -czf {archive_name} -C dist {BIN}")
        .run()
        .context("Failed to create tarball")?;

    println!(
        "✅ Distribution package created: {} (v{})",
        archive_name,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn host_triple(sh: &Shell) -> Result<String> {
    let info = cmd!(sh, "rustc -vV").read()?;
    info.lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(str::to_string)
        .context("rustc did not report a host triple")
}

fn install(sh: &Shell, prefix: &str) -> Result<()> {
    println!("📥 Installing {} to {}...", BIN, prefix);

    let binary = project_root().join("target/release").join(BIN);
    if !binary.exists() {
        println!("Building release binary first...");
        build(sh, true)?;
    }

    let bin_dir = Path::new(prefix).join("bin");
    sh.create_dir(&bin_dir)?;

    let install_path = bin_dir.join(BIN);
    sh.copy_file(&binary, &install_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&install_path, std::fs::Permissions::from_mode(0o755))?;
    }

    println!("✅ Installed to: {}", install_path.display());
    println!("   Provider CLIs (talosctl, kind, k3d, minikube) are looked up on PATH at runtime.");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔍 Running CI checks...");

    println!("\n📝 Checking formatting...");
    format(sh, true)?;

    println!("\n🔧 Running clippy...");
    clippy(sh)?;

    println!("\n🧪 Running tests...");
    test(sh, false)?;

    println!("\n💨 Running smoke test...");
    smoke(sh)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Code formatting is correct");
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Code formatted");
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(
        sh,
        "cargo clippy --all-targets --all-features -- -D warnings"
    )
    .run()?;
    println!("✅ Clippy checks passed");
    Ok(())
}

fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .to_path_buf()
}
