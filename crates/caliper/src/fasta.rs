use std::sync::Arc;

use crate::protein::Protein;

pub struct Fasta {
    pub proteins: Vec<Protein>,
    pub decoy_tag: String,
}

impl Fasta {
    // Parse a string into a fasta database. Entries whose accession contains
    // `decoy_tag` are flagged as decoys.
    pub fn parse<S: Into<String>>(contents: String, decoy_tag: S) -> Fasta {
        let decoy_tag = decoy_tag.into();

        let mut proteins = Vec::new();
        let mut last_id = "";
        let mut s = String::new();

        let mut push = |id: &str, seq: String| {
            let acc = id.split_ascii_whitespace().next().unwrap_or_default();
            proteins.push(Protein {
                accession: Arc::new(acc.to_string()),
                decoy: !decoy_tag.is_empty() && acc.contains(decoy_tag.as_str()),
                sequence: seq,
            });
        };

        for line in contents.as_str().lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(id) = line.strip_prefix('>') {
                if !s.is_empty() {
                    push(last_id, std::mem::take(&mut s));
                }
                last_id = id;
            } else {
                s.push_str(line);
            }
        }

        if !s.is_empty() {
            push(last_id, s);
        }

        Fasta {
            proteins,
            decoy_tag,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() {
        let contents = r#"
>sp|AAA|ONE first protein
MKW
LLR

>rev_sp|AAA|ONE
RLLWKM
>sp|BBB|TWO
PEPTIDE
"#;
        let fasta = Fasta::parse(contents.into(), "rev_");
        assert_eq!(fasta.proteins.len(), 3);
        assert_eq!(fasta.proteins[0].accession.as_str(), "sp|AAA|ONE");
        assert_eq!(fasta.proteins[0].sequence, "MKWLLR");
        assert!(!fasta.proteins[0].decoy);
        assert!(fasta.proteins[1].decoy);
        assert_eq!(fasta.proteins[2].sequence, "PEPTIDE");
    }
}
