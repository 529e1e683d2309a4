//! Crate-level integration and BDD tests.


#[cfg(unix)]
mod process {
    use std::path::PathBuf;

    use refiner_config::PipelineDefinition;

    use crate::executor::ProcessExecutor;
    use crate::observer::NoopObserver;
    use crate::optimizer::{FinalState, OptimizerOptions};
    use crate::report::RunReport;
    use crate::scheduler::{OverallStatus, RunOptions, Scheduler};
    use crate::test_support::{read, workspace};

    const PIPELINE: &str = r#"
validation_command: ["sh", "-c", "! grep -q BROKEN {file}"]
passes:
  - name: upper
    command: ["sh", "-c", "tr a-z A-Z < {file} > {file}.tmp && mv {file}.tmp {file}"]
  - name: breaker
    command: ["sh", "-c", "echo BROKEN >> {file}"]
  - name: stamp
    command: ["sh", "-c", "echo '# stamped' >> {file}"]
"#;

    #[test]
    fn real_processes_apply_validate_and_roll_back() {
        let dir = workspace(&[("a.txt", "hello\n"), ("b.txt", "world\n")]);
        let pipeline = PipelineDefinition::from_yaml_str(PIPELINE).expect("pipeline");
        let executor = ProcessExecutor::new();
        let options = RunOptions::new(2).with_optimizer(
            OptimizerOptions::new(2)
                .with_ignore_failure(true)
                .with_rollback_scope(refiner_config::RollbackScope::SinceLastSuccess),
        );
        let files = [PathBuf::from("a.txt"), PathBuf::from("b.txt")];

        let summary =
            Scheduler::new(&pipeline, &executor, dir.path(), options, &NoopObserver).run(&files);

        assert_eq!(summary.overall_status(), OverallStatus::Completed);
        for name in ["a.txt", "b.txt"] {
            let result = summary.get(name).expect("result");
            assert_eq!(result.final_state(), FinalState::Optimized);
            assert!(result.rollback_occurred());
            assert_eq!(result.attempts_for("breaker").count(), 2);
        }
        assert_eq!(read(&dir, "a.txt"), "HELLO\n# stamped\n");
        assert_eq!(read(&dir, "b.txt"), "WORLD\n# stamped\n");

        let report = RunReport::from_summary(&summary);
        assert_eq!(report.optimized(), 2);
        assert_eq!(report.attempts(), 8);
    }
}
