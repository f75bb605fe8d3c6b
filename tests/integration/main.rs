//! Integration tests for deplumi

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const EMPTY_SHA3: &str = "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a";

    /// Temp workspace with its own config and cache root
    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let ws = Self {
                dir: TempDir::new().unwrap(),
            };
            ws.write_config("");
            ws
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn config(&self) -> PathBuf {
            self.path().join("config.toml")
        }

        fn cache_root(&self) -> PathBuf {
            self.path().join("cache")
        }

        fn write_config(&self, resolver: &str) {
            let content = format!(
                "[general]\njournal = false\n\n[cache]\nroot = '{}'\n\n[resolver]\n{}",
                self.cache_root().display(),
                resolver
            );
            std::fs::write(self.config(), content).unwrap();
        }

        /// Names of the fake tools run so far, in order
        fn tool_calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.path().join("bin/calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("deplumi");
            cmd.arg("--config").arg(self.config()).env_remove("RUST_LOG");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("deplumi")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Build a package into an archive"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("deplumi")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("deplumi"));
    }

    #[test]
    fn config_path_honors_flag() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[resolver]"))
            .stdout(predicate::str::contains("__res__.py"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let ws = Workspace::new();
        std::fs::write(ws.config(), "[cache\n").unwrap();
        ws.cmd()
            .args(["cache", "path"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_path_uses_configured_root() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(ws.cache_root().display().to_string()));
    }

    #[test]
    fn cache_list_empty() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No build directories"));
    }

    #[test]
    fn cache_key_of_lockfile() {
        let ws = Workspace::new();
        let lock = ws.path().join("Pipfile.lock");
        std::fs::write(&lock, b"").unwrap();

        ws.cmd()
            .args(["cache", "key"])
            .arg(&lock)
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{}\n", EMPTY_SHA3)));
    }

    #[test]
    fn cache_key_missing_lockfile() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["cache", "key"])
            .arg(ws.path().join("Pipfile.lock"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Lockfile not found"))
            .stderr(predicate::str::contains("pipenv lock"));
    }

    #[test]
    fn cache_clear_partial_removes_only_partial_dirs() {
        let ws = Workspace::new();
        let partial = ws.cache_root().join("a".repeat(64));
        let complete = ws.cache_root().join("b".repeat(64));
        std::fs::create_dir_all(&partial).unwrap();
        std::fs::create_dir_all(&complete).unwrap();
        std::fs::write(complete.join(".deplumi-complete"), "").unwrap();

        ws.cmd()
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"partial\""))
            .stdout(predicate::str::contains("\"complete\""));

        ws.cmd()
            .args(["cache", "clear", "--partial", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("removed 1 build dir(s)"));

        assert!(!partial.exists());
        assert!(complete.exists());
    }

    #[test]
    fn build_without_pipfile_fails() {
        let ws = Workspace::new();
        let source = ws.path().join("svc");
        std::fs::create_dir_all(&source).unwrap();

        ws.cmd()
            .arg("build")
            .arg(&source)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unable to detect package type"))
            .stderr(predicate::str::contains("Add a Pipfile"));

        assert!(!ws.cache_root().exists());
    }

    #[test]
    fn build_with_invalid_bindings_fails() {
        let ws = Workspace::new();
        let bindings = ws.path().join("bindings.toml");
        std::fs::write(&bindings, "[resources.x]\nkind = 'nope'\n").unwrap();

        ws.cmd()
            .arg("build")
            .arg(ws.path())
            .arg("--bindings")
            .arg(&bindings)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid bindings file"));
    }

    #[cfg(unix)]
    fn install_fake_tools(ws: &Workspace, pip_exit: i32) {
        use std::os::unix::fs::PermissionsExt;

        let bin = ws.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let pipenv = bin.join("pipenv");
        let pip = bin.join("pip");
        let log = bin.join("calls.log");

        std::fs::write(
            &pipenv,
            format!(
                "#!/bin/sh\necho pipenv >> '{}'\necho 'requests==2.31.0'\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::write(
            &pip,
            format!(
                r#"#!/bin/sh
echo pip >> '{log}'
while [ $# -gt 0 ]; do
  case "$1" in
    --target) target="$2"; shift ;;
    -r) req="$2"; shift ;;
  esac
  shift
done
mkdir -p "$target/requests" "$target/requests-2.31.0.dist-info"
cp "$req" "$target/requests/__init__.py"
echo "Name: requests" > "$target/requests-2.31.0.dist-info/METADATA"
if [ {exit} -ne 0 ]; then echo "ERROR: No matching distribution" >&2; fi
exit {exit}
"#,
                exit = pip_exit,
                log = log.display()
            ),
        )
        .unwrap();
        for tool in [&pipenv, &pip] {
            std::fs::set_permissions(tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        ws.write_config(&format!(
            "pipenv = '{}'\npip = '{}'\n",
            pipenv.display(),
            pip.display()
        ));
    }

    fn write_package(root: &Path) {
        std::fs::create_dir_all(root.join("app")).unwrap();
        std::fs::write(root.join("Pipfile"), "[packages]\nrequests = \"*\"\n").unwrap();
        std::fs::write(root.join("Pipfile.lock"), "{\"default\": {}}\n").unwrap();
        std::fs::write(root.join("app/handler.py"), "import __res__\n").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn build_end_to_end_with_fake_tools() {
        let ws = Workspace::new();
        install_fake_tools(&ws, 0);
        let source = ws.path().join("svc");
        write_package(&source);
        let bindings = ws.path().join("bindings.toml");
        std::fs::write(
            &bindings,
            "[resources.uploads]\ntype = 'pulumi_aws.s3.bucket.Bucket'\nattributes = { bucket = 'uploads-1a2b' }\n",
        )
        .unwrap();

        let output = ws
            .cmd()
            .arg("build")
            .arg(&source)
            .arg("--bindings")
            .arg(&bindings)
            .args(["--format", "plain"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output).unwrap();
        let mut lines = stdout.lines();
        let archive = PathBuf::from(lines.next().unwrap());
        let sha256 = lines.next().unwrap();

        assert!(archive.starts_with(ws.cache_root()));
        assert_eq!(sha256.len(), 64);

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"requests/__init__.py".to_string()));
        assert!(names.contains(&"app/handler.py".to_string()));
        assert!(names.contains(&"__res__.py".to_string()));
        assert!(!names.iter().any(|n| n.contains(".dist-info")));
        assert!(!names.iter().any(|n| n.contains(".deplumi-complete")));
        assert_eq!(ws.tool_calls(), vec!["pipenv", "pip"]);

        // Second build reuses the materialized directory
        ws.cmd()
            .arg("build")
            .arg(&source)
            .args(["--format", "plain"])
            .assert()
            .success();
        assert_eq!(ws.tool_calls(), vec!["pipenv", "pip"]);
        ws.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(ws.cache_root().display().to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn installer_failure_surfaces_stderr() {
        let ws = Workspace::new();
        install_fake_tools(&ws, 1);
        let source = ws.path().join("svc");
        write_package(&source);

        ws.cmd()
            .arg("build")
            .arg(&source)
            .args(["--format", "plain"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exit code 1"))
            .stderr(predicate::str::contains("No matching distribution"))
            .stderr(predicate::str::contains("rerun the command"));

        // The interrupted directory is now reported, not reused
        ws.cmd()
            .arg("build")
            .arg(&source)
            .args(["--format", "plain"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("incomplete"))
            .stderr(predicate::str::contains("cache clear --partial"));
        assert_eq!(ws.tool_calls(), vec!["pipenv", "pip"]);
    }
}
