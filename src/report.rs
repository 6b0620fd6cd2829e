use std::fmt::Write;

use crate::ingest::BulkImportReport;
use crate::models::{Attainment, AttainmentRecord};
use crate::pipeline::SubjectAttainment;
use crate::store::BulkSaveReport;

fn level_cell(record: &AttainmentRecord, co_no: &str) -> String {
    record
        .level_of(co_no)
        .unwrap_or(Attainment::NotComputable)
        .to_string()
}

pub fn build_report(computed: &SubjectAttainment, saved: Option<&BulkSaveReport>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Outcome Attainment Summary");
    let _ = writeln!(output, "Subject {}", computed.subject);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Outcomes");

    if computed.co_numbers.is_empty() {
        let _ = writeln!(output, "No course outcomes with attainment data.");
    } else {
        let _ = writeln!(output, "| CO | Direct | Indirect | Overall |");
        let _ = writeln!(output, "|----|--------|----------|---------|");
        for co_no in computed.co_numbers.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                co_no,
                level_cell(&computed.direct, co_no),
                level_cell(&computed.indirect, co_no),
                level_cell(&computed.overall, co_no)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Average overall attainment: {}", computed.average_overall);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Program Outcomes");

    let labelled = computed.program.labelled();
    match &computed.program.weighted_avg {
        None => {
            let _ = writeln!(output, "No CO-PO matrix recorded for this subject.");
        }
        Some(average) => {
            let weights = average.po_avg.iter().chain(average.pso_avg.iter());
            for ((label, attainment), weight) in labelled.iter().zip(weights) {
                let _ = writeln!(
                    output,
                    "- {}: correlation {:.1}, attainment {}",
                    label, weight, attainment
                );
            }
        }
    }

    if let Some(report) = saved {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Persistence");
        let _ = writeln!(
            output,
            "{} of {} records saved.",
            report.success_count(),
            report.outcomes.len()
        );
        for (key, error) in report.failures() {
            let _ = writeln!(output, "- {}: {}", key, error);
        }
    }

    output
}

/// One-line tally of a CSV import followed by each rejected row.
pub fn build_import_summary(what: &str, imported: &BulkImportReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Imported {} of {} {}.",
        imported.success_count(),
        imported.outcomes.len(),
        what
    );
    for failure in imported.failures() {
        if let Err(err) = &failure.result {
            let _ = writeln!(output, "- line {} ({}): {}", failure.line, failure.label, err);
        }
    }

    output
}
