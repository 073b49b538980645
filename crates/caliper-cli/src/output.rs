use caliper_core::collection::MatchCollection;
use caliper_core::psm::Match;
use caliper_core::score::{ScoreType, P_VALUE_NA};

use crate::Runner;

const TAB_HEADERS: [&str; 25] = [
    "scan",
    "charge",
    "spectrum precursor m/z",
    "spectrum neutral mass",
    "peptide mass",
    "delta_cn",
    "sp score",
    "sp rank",
    "xcorr score",
    "xcorr rank",
    "p-value",
    "Weibull est. q-value",
    "decoy q-value (xcorr)",
    "decoy q-value (p-value)",
    "b/y ions matched",
    "b/y ions total",
    "matches/spectrum",
    "sequence",
    "cleavage type",
    "protein id",
    "flanking aa",
    "eta",
    "beta",
    "shift",
    "corr",
];

/// Push a float, or an empty field
fn push_float(record: &mut csv::ByteRecord, value: Option<f32>) {
    match value {
        Some(value) => record.push_field(ryu::Buffer::new().format(value).as_bytes()),
        None => record.push_field(b""),
    }
}

/// Value of `score_type` for `m`, if the collection was scored for it and a
/// value could be computed
fn score(collection: &MatchCollection, m: &Match, score_type: ScoreType) -> Option<f32> {
    let value = m.score(score_type);
    (collection.scored(score_type) && value != P_VALUE_NA).then_some(value)
}

impl Runner {
    fn accessions(&self, m: &Match) -> String {
        m.peptide
            .sources
            .iter()
            .filter_map(|src| self.database.get(src.protein))
            .map(|protein| protein.accession.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn serialize_match(&self, collection: &MatchCollection, m: &Match) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        let spectrum = &m.spectrum;
        record.push_field(itoa::Buffer::new().format(spectrum.scan).as_bytes());
        record.push_field(itoa::Buffer::new().format(m.charge).as_bytes());
        record.push_field(ryu::Buffer::new().format(spectrum.precursor_mz).as_bytes());
        record.push_field(
            ryu::Buffer::new()
                .format(spectrum.neutral_mass(m.charge))
                .as_bytes(),
        );
        record.push_field(ryu::Buffer::new().format(m.peptide.monoisotopic).as_bytes());
        record.push_field(ryu::Buffer::new().format(m.delta_cn).as_bytes());

        for ty in [ScoreType::Sp, ScoreType::XCorr] {
            match collection.scored(ty) {
                true => {
                    record.push_field(ryu::Buffer::new().format(m.score(ty)).as_bytes());
                    record.push_field(itoa::Buffer::new().format(m.rank(ty)).as_bytes());
                }
                false => {
                    record.push_field(b"");
                    record.push_field(b"");
                }
            }
        }

        // p-values and their q-values are stored as -ln p
        push_float(
            &mut record,
            score(collection, m, ScoreType::PValue).map(|p| (-p).exp()),
        );
        push_float(
            &mut record,
            score(collection, m, ScoreType::WeibullQValue).map(|q| (-q).exp()),
        );
        push_float(&mut record, score(collection, m, ScoreType::DecoyXCorrQValue));
        push_float(&mut record, score(collection, m, ScoreType::DecoyPValueQValue));

        record.push_field(itoa::Buffer::new().format(m.ions_matched).as_bytes());
        record.push_field(itoa::Buffer::new().format(m.ions_possible).as_bytes());
        record.push_field(itoa::Buffer::new().format(m.experiment_size()).as_bytes());
        record.push_field(m.peptide.to_string().as_bytes());
        record.push_field(
            self.parameters
                .parameters
                .peptide
                .cleavage
                .to_string()
                .as_bytes(),
        );
        record.push_field(self.accessions(m).as_bytes());
        let flanking = m
            .peptide
            .sources
            .iter()
            .map(|src| {
                let (before, after) = self.database.flanking(src, m.peptide.len());
                format!("{}{}", before, after)
            })
            .collect::<Vec<_>>()
            .join(",");
        record.push_field(flanking.as_bytes());

        let fit = collection.weibull();
        let fitted = fit.eta > 0.0;
        for value in [fit.eta, fit.beta, fit.shift, fit.correlation] {
            push_float(&mut record, fitted.then_some(value as f32));
        }
        record
    }

    /// Write every target match, best first, as tab-separated values
    pub fn write_tab(&self, collection: &mut MatchCollection) -> anyhow::Result<String> {
        let path = self.make_path("qvalues.target.txt");

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);
        wtr.write_byte_record(&csv::ByteRecord::from(TAB_HEADERS.to_vec()))?;

        let score_type = match collection.scored(ScoreType::PValue) {
            true => ScoreType::PValue,
            false => ScoreType::XCorr,
        };
        collection.sort(score_type)?;
        let collection = &*collection;
        for m in collection.try_iter(score_type)? {
            let m = m.borrow();
            if m.decoy {
                continue;
            }
            wtr.write_byte_record(&self.serialize_match(collection, &m))?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)?;
        Ok(path.display().to_string())
    }

    fn sqt_header(&self, wtr: &mut csv::Writer<Vec<u8>>, pvalues: bool) -> csv::Result<()> {
        let parameters = &self.parameters.parameters;
        let targets = self.database.proteins().filter(|(_, p)| !p.decoy).count();

        wtr.write_record(["H", "SQTGenerator", "caliper"])?;
        wtr.write_record(["H", "SQTGeneratorVersion", self.parameters.version.as_str()])?;
        wtr.write_record(["H", "Database", self.parameters.fasta.as_str()])?;
        wtr.write_record(["H", "DBLocusCount", itoa::Buffer::new().format(targets)])?;
        wtr.write_record([
            "H",
            "Comment",
            format!("preliminary algorithm {}", parameters.prelim_score_type).as_str(),
        ])?;
        wtr.write_record([
            "H",
            "Comment",
            format!("final algorithm {}", parameters.score_type).as_str(),
        ])?;
        for m in &parameters.mods {
            wtr.write_record([
                "H",
                "DiffMod",
                format!("{}{}={:+.2}", m.residues, m.symbol, m.mass_change).as_str(),
            ])?;
        }
        wtr.write_record([
            "H",
            "Alg-DisplayTop",
            itoa::Buffer::new().format(parameters.top_match),
        ])?;
        wtr.write_record(["H", "EnzymeSpec", parameters.peptide.cleavage.to_string().as_str()])?;
        wtr.write_record([
            "H",
            "Line fields: S, scan number, scan number, charge, 0, precursor mass, 0, 0, \
             number of matches",
        ])?;
        let (first, second) = match pvalues {
            true => ("-log(p-value)", "xcorr"),
            false => ("xcorr", "sp"),
        };
        wtr.write_record([
            "H",
            format!(
                "Line fields: M, rank by xcorr score, rank by sp score, peptide mass, deltaCn, \
                 {} score, {} score, number ions matched, total ions compared, sequence",
                first, second
            )
            .as_str(),
        ])?;
        Ok(())
    }

    /// Write target matches in SQT format: one `S` line per spectrum and
    /// charge, followed by its `M` lines (up to `top_match` by xcorr rank)
    /// and an `L` line per protein
    pub fn write_sqt(&self, collection: &mut MatchCollection) -> anyhow::Result<String> {
        let path = self.make_path("qvalues.target.sqt");
        let top_match = self.parameters.parameters.top_match;

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(vec![]);
        let pvalues = collection.scored(ScoreType::PValue);
        self.sqt_header(&mut wtr, pvalues)?;

        collection.spectrum_sort(ScoreType::XCorr)?;
        let mut last = None;
        for m in collection.try_iter(ScoreType::XCorr)? {
            let m = m.borrow();
            if m.decoy || m.rank(ScoreType::XCorr) > top_match {
                continue;
            }

            let spectrum = (m.spectrum.scan, m.charge);
            if last != Some(spectrum) {
                last = Some(spectrum);
                let scan = itoa::Buffer::new().format(m.spectrum.scan).to_string();
                wtr.write_record([
                    "S",
                    scan.as_str(),
                    scan.as_str(),
                    itoa::Buffer::new().format(m.charge),
                    "0",
                    "caliper",
                    format!("{:.2}", m.spectrum.neutral_mass(m.charge)).as_str(),
                    "0",
                    "0",
                    itoa::Buffer::new().format(m.experiment_size()),
                ])?;
            }

            let (first, second) = match pvalues {
                true => (m.score(ScoreType::PValue), m.score(ScoreType::XCorr)),
                false => (m.score(ScoreType::XCorr), m.score(ScoreType::Sp)),
            };
            let (before, after) = m
                .peptide
                .sources
                .first()
                .map(|src| self.database.flanking(src, m.peptide.len()))
                .unwrap_or(('-', '-'));
            wtr.write_record([
                "M",
                itoa::Buffer::new().format(m.rank(ScoreType::XCorr)),
                itoa::Buffer::new().format(m.rank(ScoreType::Sp)),
                format!("{:.4}", m.peptide.monoisotopic).as_str(),
                format!("{:.4}", m.delta_cn).as_str(),
                format!("{:.4}", first).as_str(),
                format!("{:.4}", second).as_str(),
                itoa::Buffer::new().format(m.ions_matched),
                itoa::Buffer::new().format(m.ions_possible),
                format!("{}.{}.{}", before, m.peptide, after).as_str(),
                "U",
            ])?;
            for src in &m.peptide.sources {
                if let Some(protein) = self.database.get(src.protein) {
                    wtr.write_record(["L", protein.accession.as_str()])?;
                }
            }
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)?;
        Ok(path.display().to_string())
    }
}
