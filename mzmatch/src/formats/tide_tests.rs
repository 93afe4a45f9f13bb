#![allow(clippy::missing_panics_doc)]
use std::{collections::HashMap, io::BufReader};

use context_error::*;

use crate::{
    config::{ReaderSettings, SearchConfiguration},
    error::ParseErrorKind,
    model::{Advocate, SpectrumId},
    progress::ProgressHandler,
    reader::IdentificationReader,
    resolution::FixedModificationRule,
    test::test_format,
};

use super::TideReader;

fn reader(data: &'static str, settings: ReaderSettings) -> TideReader<BufReader<&'static [u8]>> {
    TideReader::from_reader(
        BufReader::new(data.as_bytes()),
        "run1.tide-search.target.txt",
        Some(data.len() as u64),
        settings,
    )
}

#[test]
fn single_row() {
    let matches = test_format(
        || reader(TIDE_SINGLE, ReaderSettings::default()),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    assert_eq!(matches.len(), 1);
    let spectrum_match = &matches[0];
    assert_eq!(spectrum_match.key().file, "run1");
    assert_eq!(spectrum_match.key().spectrum, SpectrumId::Index(10));
    assert_eq!(spectrum_match.spectrum_number(), Some(10));
    let hits = spectrum_match.hits(&Advocate::Tide);
    assert_eq!(hits.len(), 1);
    let assumption = &hits[0].assumption;
    assert!((assumption.e_value() - 0.001).abs() < 1e-6);
    assert_eq!(assumption.raw_score(), Some(3.0));
    assert_eq!(assumption.rank(), 1);
    assert_eq!(assumption.charge().value(), 2);
    let peptide = assumption.as_peptide().unwrap();
    assert_eq!(peptide.sequence(), "TAMAGK");
    assert_eq!(peptide.modifications().len(), 1);
    let modification = &peptide.modifications()[0];
    assert_eq!(modification.site(), 3);
    assert!(modification.is_variable());
    assert_eq!(modification.tag(), "15.9949@M");
}

#[test]
fn full_file() {
    let search = SearchConfiguration::default()
        .with_fixed_modification(FixedModificationRule::new(57.021464, "C"));
    let matches = test_format(
        || reader(TIDE_FULL, ReaderSettings::default()),
        &search,
        None,
        false,
    )
    .unwrap();
    // Scan 3 occurs twice, but not on adjacent rows
    assert_eq!(matches.len(), 3);
    assert_eq!(
        matches
            .iter()
            .map(|m| m.key().spectrum.index())
            .collect::<Vec<_>>(),
        [Some(3), Some(7), Some(12)]
    );
    assert_eq!(matches[0].hits(&Advocate::Tide).len(), 2);
    let carbamidomethyl = matches[1].hits(&Advocate::Tide)[0]
        .assumption
        .as_peptide()
        .unwrap()
        .modifications()[0]
        .clone();
    assert!(carbamidomethyl.is_fixed());
    assert_eq!(carbamidomethyl.site(), 2);
    // Negative xcorr
    let negative = &matches[2].hits(&Advocate::Tide)[0].assumption;
    assert!((negative.e_value() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn p_value_preferred() {
    let matches = reader(TIDE_P_VALUE, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap();
    let assumption = &matches[0].hits(&Advocate::Tide)[0].assumption;
    assert!((assumption.e_value() - 2.5e-5).abs() < 1e-12);
}

#[test]
fn titles() {
    let mut titles = HashMap::new();
    titles.insert(
        "run1.mgf".to_string(),
        (0..=10).map(|i| format!("spectrum {i}")).collect(),
    );
    let matches = reader(TIDE_SINGLE, ReaderSettings::default().with_titles(titles))
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap();
    assert_eq!(
        matches[0].key().spectrum,
        SpectrumId::Title("spectrum 10".to_string())
    );
}

#[test]
fn ambiguous() {
    let matches = reader(TIDE_AMBIGUOUS, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, true)
        .unwrap();
    let hits = matches[0].hits(&Advocate::Tide);
    assert_eq!(hits.len(), 20);
    assert_eq!(hits.iter().filter(|h| h.primary).count(), 1);
    assert!(hits.iter().all(|h| h.assumption.rank() == 1));
}

#[test]
fn charge_states() {
    let matches = test_format(
        || reader(TIDE_CHARGE_STATES, ReaderSettings::default()),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    assert_eq!(matches.len(), 2);
    let hits = matches[0].hits(&Advocate::Tide);
    // Ranks restart for every charge state and when the scan is listed again
    assert_eq!(
        hits.iter()
            .map(|h| (
                h.assumption.sequence(),
                h.assumption.rank(),
                h.assumption.charge().value(),
                h.block
            ))
            .collect::<Vec<_>>(),
        [
            ("PEPTIDE", 1, 2, 0),
            ("PEPTIDA", 2, 2, 0),
            ("PEPTIDK", 1, 3, 1),
            ("PEPTIDR", 1, 2, 2),
        ]
    );
}

#[test]
fn rank_out_of_order() {
    let error = reader(TIDE_RANK_OUT_OF_ORDER, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

#[test]
fn missing_sequence_column() {
    let error = reader(TIDE_NO_SEQUENCE, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(
        error.get_kind(),
        ParseErrorKind::MissingMandatoryField
    ));
}

#[test]
fn malformed_row() {
    let error = reader(TIDE_MALFORMED, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

/// Cancels after a fixed number of spectrum matches were completed
struct CancelAfter {
    flushed: usize,
    limit: usize,
}

impl ProgressHandler for CancelAfter {
    fn spectrum_flushed(&mut self, _key: &crate::model::SpectrumKey) {
        self.flushed += 1;
    }
    fn is_cancelled(&self) -> bool {
        self.flushed >= self.limit
    }
}

#[test]
fn cancelled() {
    let mut tide = reader(TIDE_TEN_SPECTRA, ReaderSettings::default());
    let mut progress = CancelAfter {
        flushed: 0,
        limit: 3,
    };
    let matches = tide
        .parse(&mut progress, &SearchConfiguration::default(), None, false)
        .unwrap();
    assert_eq!(matches.len(), 3);
    // The handle is closed
    assert!(
        tide.parse(&mut (), &SearchConfiguration::default(), None, false)
            .is_err()
    );
    tide.close();
}

const TIDE_SINGLE: &str = "file\tscan\tcharge\tspectrum precursor m/z\tspectrum neutral mass\tpeptide mass\tdelta_cn\tsp score\tsp rank\txcorr score\txcorr rank\tb/y ions matched\tb/y ions total\tdistinct matches/spectrum\tsequence\tcleavage type\tprotein id\tflanking aa
run1.mgf\t10\t2\t603.2943\t1204.5740\t1204.5740\t0.1523\t120.5\t1\t3.0\t1\t8\t10\t112\tTAM[15.9949]AGK\ttrypsin/p-full-digest\tsp|P02768|ALBU_HUMAN(24)\tKR
";

const TIDE_FULL: &str = "file\tscan\tcharge\tspectrum precursor m/z\txcorr score\txcorr rank\tsequence\tprotein id
run1.mgf\t3\t2\t500.2566\t2.8745\t1\tPEPTIDEK\tsp|P1|A(10)
run1.mgf\t7\t3\t402.8811\t1.5531\t1\tAC[57.021464]DEFGHIK\tsp|P2|B(4)
run1.mgf\t3\t2\t500.2566\t1.2201\t2\tPEPTLDEK\tsp|P3|C(80)
run1.mgf\t12\t1\t899.4434\t-0.0211\t1\tM[15.9949]LSEK\tsp|P4|D(1)
";

const TIDE_CHARGE_STATES: &str = "scan\tcharge\txcorr score\txcorr rank\tsequence
10\t2\t3.1\t1\tPEPTIDE
10\t2\t2.4\t2\tPEPTIDA
10\t3\t2.9\t1\tPEPTIDK
11\t2\t1.8\t1\tPEPTIDEK
10\t2\t1.1\t1\tPEPTIDR
";

const TIDE_RANK_OUT_OF_ORDER: &str = "scan\tcharge\txcorr score\txcorr rank\tsequence
10\t2\t2.4\t2\tPEPTIDA
10\t2\t3.1\t1\tPEPTIDE
";

const TIDE_P_VALUE: &str = "scan\tcharge\txcorr score\texact p-value\txcorr rank\tsequence
4\t2\t2.1\t2.5e-5\t1\tPEPTIDER
";

const TIDE_AMBIGUOUS: &str = "scan\tcharge\txcorr score\txcorr rank\tsequence
1\t2\t2.0\t1\tPEPXIDE
";

const TIDE_NO_SEQUENCE: &str = "scan\tcharge\txcorr score\txcorr rank\tpeptide
1\t2\t2.0\t1\tPEPTIDE
";

const TIDE_MALFORMED: &str = "scan\tcharge\txcorr score\txcorr rank\tsequence
1\t2\t2.0\t1\tPEPT[15.99IDE
";

const TIDE_TEN_SPECTRA: &str = "scan\tcharge\txcorr score\txcorr rank\tsequence
0\t2\t2.0\t1\tPEPTIDEA
1\t2\t2.0\t1\tPEPTIDEC
2\t2\t2.0\t1\tPEPTIDED
3\t2\t2.0\t1\tPEPTIDEE
4\t2\t2.0\t1\tPEPTIDEF
5\t2\t2.0\t1\tPEPTIDEG
6\t2\t2.0\t1\tPEPTIDEH
7\t2\t2.0\t1\tPEPTIDEI
8\t2\t2.0\t1\tPEPTIDEK
9\t2\t2.0\t1\tPEPTIDEL
";
