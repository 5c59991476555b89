use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, error, info};

use super::archive::{read_main_class, ArchiveOpener};
use super::profile::Processor;
use super::values::substitute_arg;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

const STDERR_TAIL_LINES: usize = 20;

const CLASSPATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// What every processor launch shares within one install.
pub struct ProcessorEnv<'a> {
    pub java: &'a Path,
    pub libraries_dir: &'a Path,
    pub working_dir: &'a Path,
    pub archives: &'a dyn ArchiveOpener,
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run processor `index` to completion. Blocks the install until the child
/// exits; processors may consume each other's output.
pub async fn run_processor(
    env: &ProcessorEnv<'_>,
    index: usize,
    processor: &Processor,
    values: &HashMap<String, String>,
) -> LauncherResult<()> {
    let task = processor.task_label().map(str::to_string);
    let jar = MavenArtifact::parse(&processor.jar)?.path_in(env.libraries_dir);

    let mut classpath = Vec::with_capacity(processor.classpath.len() + 1);
    for coord in &processor.classpath {
        let entry = MavenArtifact::parse(coord)?.path_in(env.libraries_dir);
        classpath.push(entry.to_string_lossy().into_owned());
    }
    classpath.push(jar.to_string_lossy().into_owned());

    let main_class = read_main_class(env.archives, &jar)?;
    let args = processor
        .args
        .iter()
        .map(|arg| substitute_arg(arg, values, env.libraries_dir))
        .collect::<LauncherResult<Vec<_>>>()?;

    info!(
        "Running processor #{} {} ({})",
        index,
        task.as_deref().unwrap_or(&processor.jar),
        main_class
    );
    debug!("Processor #{} args: {:?}", index, args);

    let output = tokio::process::Command::new(env.java)
        .arg("-cp")
        .arg(classpath.join(CLASSPATH_SEPARATOR))
        .arg(&main_class)
        .args(&args)
        .current_dir(env.working_dir)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| LauncherError::ProcessorSpawn {
            index,
            task: task.clone(),
            source,
        })?;

    if !output.status.success() {
        let tail = stderr_tail(&output.stderr);
        error!(
            "Processor #{} failed with {:?}:\n{}",
            index,
            output.status.code(),
            tail
        );
        return Err(LauncherError::ProcessorFailed {
            index,
            task,
            code: output.status.code(),
            stderr_tail: tail,
        });
    }
    Ok(())
}


#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::testing::fake_java;
    use super::*;
    use crate::core::loaders::archive::testing::write_jar;
    use crate::core::loaders::archive::ZipOpener;

    fn processor(args: &[&str]) -> Processor {
        Processor {
            jar: "net.minecraftforge:installertools:1.3.0".into(),
            classpath: vec!["net.sf.jopt-simple:jopt-simple:5.0.4".into()],
            args: args.iter().map(|a| a.to_string()).collect(),
            sides: None,
        }
    }

    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let libs = dir.join("libraries");
        write_jar(
            &libs.join("net/minecraftforge/installertools/1.3.0/installertools-1.3.0.jar"),
            &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\nMain-Class: tools.Main\n")],
        );
        (libs, dir.join("java.log"))
    }

    #[tokio::test]
    async fn processor_gets_classpath_main_class_and_substituted_args() {
        let dir = tempfile::tempdir().unwrap();
        let (libs, log) = setup(dir.path());
        let java = fake_java(dir.path(), &log);
        let env = ProcessorEnv {
            java: &java,
            libraries_dir: &libs,
            working_dir: dir.path(),
            archives: &ZipOpener,
        };
        let values = HashMap::from([("SIDE".to_string(), "client".to_string())]);

        run_processor(&env, 0, &processor(&["--task", "MCP_DATA", "--side", "{SIDE}"]), &values)
            .await
            .unwrap();

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("jopt-simple-5.0.4.jar:"));
        assert!(logged.contains("installertools-1.3.0.jar tools.Main --task MCP_DATA --side client"));
    }

    #[tokio::test]
    async fn non_zero_exit_reports_index_task_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let (libs, log) = setup(dir.path());
        let java = fake_java(dir.path(), &log);
        let env = ProcessorEnv {
            java: &java,
            libraries_dir: &libs,
            working_dir: dir.path(),
            archives: &ZipOpener,
        };

        let err = run_processor(&env, 4, &processor(&["--task", "PATCH", "FAIL"]), &HashMap::new())
            .await
            .unwrap_err();
        match err {
            LauncherError::ProcessorFailed {
                index,
                task,
                code,
                stderr_tail,
            } => {
                assert_eq!(index, 4);
                assert_eq!(task.as_deref(), Some("PATCH"));
                assert_eq!(code, Some(1));
                assert!(stderr_tail.contains("processor exploded"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_java_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let (libs, _) = setup(dir.path());
        let java = dir.path().join("no-such-java");
        let env = ProcessorEnv {
            java: &java,
            libraries_dir: &libs,
            working_dir: dir.path(),
            archives: &ZipOpener,
        };

        let err = run_processor(&env, 1, &processor(&[]), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ProcessorSpawn { index: 1, task: None, .. }));
    }
}
