use std::collections::HashMap;

use detector::flagger::ValidatorVerdict;
use detector::ports::ValidatorMetadata;
use sandwich_core::ValidatorReportRecord;
use solana_sdk::pubkey::Pubkey;

use crate::exclusions::ExclusionList;

/// Turns flag verdicts into the externally consumed record set.
/// Metadata is joined here and nowhere deeper: the detector and flagger never
/// see names or vote accounts.
pub struct ReportAssembler {
    min_slots: u64,
    exclusions: ExclusionList,
}

impl ReportAssembler {
    pub fn new(min_slots: u64, exclusions: ExclusionList) -> Self {
        Self { min_slots, exclusions }
    }

    /// One record per evaluated validator, in verdict order.
    pub fn assemble(
        &self,
        verdicts: &[ValidatorVerdict],
        metadata: &HashMap<Pubkey, ValidatorMetadata>,
    ) -> Vec<ValidatorReportRecord> {
        verdicts
            .iter()
            .map(|v| {
                let meta = metadata.get(&v.identity).cloned().unwrap_or_default();
                ValidatorReportRecord {
                    identity: v.identity,
                    vote_account: meta.vote_account,
                    name: meta.name,
                    sc: v.sc,
                    sc_p: v.sc_p,
                    sc_raw: v.sc_raw,
                    sc_p_raw: v.sc_p_raw,
                    slots: v.slots,
                    sc_p_lower: v.sc_p_interval.0,
                    sc_p_upper: v.sc_p_interval.1,
                    sc_lower: v.sc_interval.0,
                    sc_upper: v.sc_interval.1,
                    sc_p_flag: v.sc_p_flag,
                    sc_flag: v.sc_flag,
                }
            })
            .collect()
    }

    /// The filtered view downstream consumers act on: both flags set, enough
    /// sample, and not manually excluded.
    pub fn filtered<'a>(
        &self,
        records: &'a [ValidatorReportRecord],
    ) -> Vec<&'a ValidatorReportRecord> {
        records
            .iter()
            .filter(|r| r.sc_flag && r.sc_p_flag)
            .filter(|r| r.slots >= self.min_slots)
            .filter(|r| !self.exclusions.contains(&r.identity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(identity: Pubkey, slots: u64, flagged: bool) -> ValidatorVerdict {
        ValidatorVerdict {
            identity,
            slots,
            sc_raw: 12.0,
            sc_p_raw: 8.0,
            sc: 12.0 / slots as f64,
            sc_p: 8.0 / slots as f64,
            sc_interval: (0.001, 0.02),
            sc_p_interval: (0.002, 0.03),
            sc_flag: flagged,
            sc_p_flag: flagged,
        }
    }

    #[test]
    fn test_record_has_metadata_joined() {
        let identity = Pubkey::new_unique();
        let vote = Pubkey::new_unique();
        let mut metadata = HashMap::new();
        metadata.insert(
            identity,
            ValidatorMetadata {
                vote_account: Some(vote),
                name: Some("Example Validator".to_string()),
            },
        );
        let assembler = ReportAssembler::new(50, ExclusionList::empty());
        let records = assembler.assemble(&[verdict(identity, 1000, true)], &metadata);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vote_account, Some(vote));
        assert_eq!(records[0].name.as_deref(), Some("Example Validator"));
        assert_eq!(records[0].slots, 1000);
        assert!(records[0].sc_flag && records[0].sc_p_flag);
    }

    #[test]
    fn test_missing_metadata_leaves_fields_empty() {
        let assembler = ReportAssembler::new(50, ExclusionList::empty());
        let records = assembler.assemble(&[verdict(Pubkey::new_unique(), 100, false)], &HashMap::new());
        assert_eq!(records[0].vote_account, None);
        assert_eq!(records[0].name, None);
    }

    #[test]
    fn test_filtered_requires_both_flags() {
        let identity = Pubkey::new_unique();
        let mut v = verdict(identity, 1000, true);
        v.sc_flag = false;
        let assembler = ReportAssembler::new(50, ExclusionList::empty());
        let records = assembler.assemble(&[v], &HashMap::new());
        assert!(assembler.filtered(&records).is_empty());
    }

    #[test]
    fn test_small_sample_excluded_from_filtered_view() {
        // Scenario 5: N=10 with both flags set appears in the full report but
        // not in the filtered one
        let assembler = ReportAssembler::new(50, ExclusionList::empty());
        let records = assembler.assemble(&[verdict(Pubkey::new_unique(), 10, true)], &HashMap::new());
        assert_eq!(records.len(), 1);
        assert!(assembler.filtered(&records).is_empty());
    }

    #[test]
    fn test_boundary_sample_size_included() {
        let assembler = ReportAssembler::new(50, ExclusionList::empty());
        let records = assembler.assemble(&[verdict(Pubkey::new_unique(), 50, true)], &HashMap::new());
        assert_eq!(assembler.filtered(&records).len(), 1);
    }

    #[tokio::test]
    async fn test_exclusion_override_removes_from_filtered_view() {
        let identity = Pubkey::new_unique();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exclusions.json");
        tokio::fs::write(
            &path,
            format!(r#"[{{"identity": "{}", "reason": "manual review"}}]"#, identity),
        )
        .await
        .unwrap();
        let exclusions = ExclusionList::from_file(&path).await.unwrap();

        let assembler = ReportAssembler::new(50, exclusions);
        let records = assembler.assemble(&[verdict(identity, 1000, true)], &HashMap::new());
        // Present in the full set, absent from the filtered one
        assert_eq!(records.len(), 1);
        assert!(assembler.filtered(&records).is_empty());
    }
}
