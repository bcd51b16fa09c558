use ovs_engine::{SearchOutcome, SessionSummary, TimelineSample};

/// One human-readable progress line per timeline snapshot.
pub fn progress_line(sample: &TimelineSample) -> String {
    format!(
        "[{stage}] steps {r}+{t} blocks {rb}+{tb} fraction {f:.3}/{a:.3} ratio {ratio:.6e} err {err:.2e}",
        stage = sample.stage,
        r = sample.reference_steps,
        t = sample.target_steps,
        rb = sample.reference_blocks,
        tb = sample.target_blocks,
        f = sample.target_fraction,
        a = sample.actual_fraction,
        ratio = sample.ratio,
        err = sample.error,
    )
}

/// One line per executed search stage: grid shape, steps, located bias.
pub fn search_lines(search: &SearchOutcome) -> Vec<String> {
    search
        .stages
        .iter()
        .map(|stage| {
            let located = match stage.winning_index {
                Some(index) => {
                    format!(" -> bias {:.6e} (index {index})", stage.located_bias)
                }
                None => String::new(),
            };
            format!(
                "[{}] center {:.6e} span {} points {} steps {}+{}{located}",
                stage.stage.as_str(),
                stage.center,
                stage.span,
                stage.points,
                stage.reference_steps,
                stage.target_steps,
            )
        })
        .collect()
}

/// Final report lines printed once a session completes.
pub fn final_lines(summary: &SessionSummary) -> Vec<String> {
    let search = &summary.search;
    let estimate = &summary.estimate;
    let mut lines = Vec::new();
    lines.push(format!(
        "locked bias {:.6e}{}",
        search.bias,
        if search.from_restart { " (restart)" } else { "" }
    ));
    if let Some(note) = &search.restart_note {
        lines.push(format!("restart note: {note}"));
    }
    lines.push(format!(
        "ratio {:.6e} +/- {:.2e}",
        estimate.ratio, estimate.error
    ));
    lines.push(format!(
        "delta_f {:.6} +/- {:.6} at temperature {}",
        estimate.delta_f, estimate.delta_f_error, summary.temperature
    ));
    lines.push(format!(
        "production steps {} reference / {} target (target fraction {:.3}, realized {:.3})",
        summary.reference_steps,
        summary.target_steps,
        summary.target_fraction,
        summary.actual_fraction
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_engine::{FreeEnergyResult, SearchOutcome};

    fn sample_summary() -> SessionSummary {
        SessionSummary {
            schema: "ovs-run-summary/1".to_string(),
            temperature: 1.0,
            search: SearchOutcome {
                bias: 0.135,
                from_restart: true,
                restart_note: None,
                stages: Vec::new(),
            },
            estimate: FreeEnergyResult {
                ratio: 0.1353,
                error: 0.002,
                delta_f: 2.0002,
                delta_f_error: 0.0148,
            },
            reference_steps: 60_000,
            target_steps: 40_000,
            target_fraction: 0.6,
            actual_fraction: 0.6,
        }
    }

    #[test]
    fn progress_line_is_stable() {
        let sample = TimelineSample {
            stage: "production".to_string(),
            reference_steps: 500,
            target_steps: 500,
            reference_blocks: 25,
            target_blocks: 25,
            target_fraction: 0.5,
            actual_fraction: 0.5,
            ratio: 0.25,
            error: 0.5,
        };
        assert_eq!(
            progress_line(&sample),
            "[production] steps 500+500 blocks 25+25 fraction 0.500/0.500 ratio 2.500000e-1 err 5.00e-1"
        );
    }

    #[test]
    fn final_lines_cover_the_estimate_and_the_restart_flag() {
        let lines = final_lines(&sample_summary());
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("(restart)"));
        assert!(lines[1].contains("ratio 1.353000e-1"));
        assert!(lines[2].contains("delta_f 2.000200 +/- 0.014800"));
        assert!(lines[3].starts_with("production steps 60000 reference"));
    }

    #[test]
    fn search_lines_follow_the_stage_history() {
        use ovs_engine::{SearchStage, StageOutcome};
        let search = SearchOutcome {
            bias: 0.135,
            from_restart: false,
            restart_note: None,
            stages: vec![
                StageOutcome {
                    stage: SearchStage::Warmup,
                    center: 1.0,
                    span: 40.0,
                    points: 41,
                    block_size: 10,
                    reference_steps: 2_500,
                    target_steps: 2_500,
                    winning_index: None,
                    located_bias: 1.0,
                },
                StageOutcome {
                    stage: SearchStage::CoarseScan,
                    center: 1.0,
                    span: 40.0,
                    points: 41,
                    block_size: 10,
                    reference_steps: 5_000,
                    target_steps: 5_000,
                    winning_index: Some(17),
                    located_bias: 0.135,
                },
            ],
        };
        let lines = search_lines(&search);
        assert_eq!(
            lines[0],
            "[warmup] center 1.000000e0 span 40 points 41 steps 2500+2500"
        );
        assert_eq!(
            lines[1],
            "[coarse-scan] center 1.000000e0 span 40 points 41 steps 5000+5000 \
             -> bias 1.350000e-1 (index 17)"
        );
    }

    #[test]
    fn restart_notes_are_surfaced() {
        let mut summary = sample_summary();
        summary.search.restart_note = Some("stale file".to_string());
        let lines = final_lines(&summary);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "restart note: stale file");
    }
}
