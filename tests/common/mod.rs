use std::path::Path;

use bioseek::classifier::NaiveBayesClassifier;
use bioseek::config::EngineConfig;
use bioseek::models::{PaperMetadata, SparseVector};
use bioseek::search::tokenize;
use bioseek::shard::{write_shard, ShardStore};
use bioseek::tfidf::TfIdfModel;
use bioseek::vocabulary::{PruneParams, Vocabulary, VocabularyBuilder};

pub struct Doc {
    pub category: &'static str,
    pub journal: &'static str,
    pub year: i32,
    pub title: &'static str,
    pub abstract_text: &'static str,
}

/// A tiny corpus across three categories. Category shards carry their own
/// documents; the oversized "all" category is split into all1/all2.
pub fn corpus() -> Vec<Doc> {
    vec![
        Doc {
            category: "virology",
            journal: "Journal of Virology",
            year: 2020,
            title: "Coronavirus spike protein structure",
            abstract_text: "The coronavirus spike protein binds the host receptor",
        },
        Doc {
            category: "virology",
            journal: "Journal of Virology",
            year: 2021,
            title: "Antibody response after coronavirus infection",
            abstract_text: "Neutralizing antibody titers rise after infection",
        },
        Doc {
            category: "virology",
            journal: "Nature",
            year: 2021,
            title: "Spike glycoprotein receptor binding",
            abstract_text: "Receptor binding domain of the spike glycoprotein",
        },
        Doc {
            category: "virology",
            journal: "Cell",
            year: 2019,
            title: "Viral replication inside host cells",
            abstract_text: "Coronavirus replication depends on host factors",
        },
        Doc {
            category: "biochemistry",
            journal: "Journal of Biological Chemistry",
            year: 2018,
            title: "Enzyme kinetics of protein folding",
            abstract_text: "Folding rates measured across enzyme substrates",
        },
        Doc {
            category: "biochemistry",
            journal: "Journal of Biological Chemistry",
            year: 2020,
            title: "Metabolic pathways inside liver cells",
            abstract_text: "Enzyme regulation shapes metabolism",
        },
        Doc {
            category: "biochemistry",
            journal: "Nature",
            year: 2017,
            title: "Protein crystallography methods",
            abstract_text: "Crystal structures of folded proteins",
        },
        Doc {
            category: "nutrition",
            journal: "American Journal of Clinical Nutrition",
            year: 2019,
            title: "Vitamin supplementation outcomes",
            abstract_text: "Dietary vitamin intake shapes health outcomes",
        },
        Doc {
            category: "nutrition",
            journal: "American Journal of Clinical Nutrition",
            year: 2022,
            title: "Dietary fiber and gut health",
            abstract_text: "Fiber rich diets improve digestion",
        },
    ]
}

fn metadata(n: usize, doc: &Doc) -> PaperMetadata {
    PaperMetadata {
        doi: format!("10.1234/{}.{n}", doc.category),
        title: doc.title.to_string(),
        doi_url: format!("https://doi.org/10.1234/{}.{n}", doc.category),
        journal_name: doc.journal.to_string(),
        year: doc.year,
        category: doc.category.to_string(),
        abstract_text: Some(doc.abstract_text.to_string()),
        ..PaperMetadata::default()
    }
}

fn doc_tokens(doc: &Doc) -> Vec<String> {
    tokenize(&format!("{} {}", doc.title, doc.abstract_text))
}

/// Builds the whole model bundle (vocabulary, TF-IDF model, classifier,
/// shards) into `dir` the way the offline build would.
pub fn build_bundle(dir: &Path) {
    let docs = corpus();

    let mut builder = VocabularyBuilder::new(PruneParams {
        no_below: 1,
        no_above: 1.0,
        ..PruneParams::default()
    });
    for doc in &docs {
        builder.add_document(&doc_tokens(doc));
    }
    let vocab = builder.finish();
    vocab.save(&dir.join("vocab.bin")).unwrap();

    let tfidf = TfIdfModel::train(
        vocab.size(),
        docs.iter().map(|doc| vocab.doc_to_bow(&doc_tokens(doc))),
    );
    tfidf.save(&dir.join("tfidf.bin")).unwrap();

    let vectorized: Vec<(PaperMetadata, SparseVector)> = docs
        .iter()
        .enumerate()
        .map(|(n, doc)| {
            let vector = tfidf.transform(&vocab.doc_to_bow(&doc_tokens(doc)));
            (metadata(n, doc), vector)
        })
        .collect();

    let shards_dir = dir.join("shards");
    for category in ["virology", "biochemistry", "nutrition"] {
        let members: Vec<_> = vectorized
            .iter()
            .filter(|(meta, _)| meta.category == category)
            .cloned()
            .collect();
        write_shard(&shards_dir, category, vocab.size() as u32, &members).unwrap();
    }
    // The aggregate category is oversized and ships as fixed sub-shards
    let half = vectorized.len() / 2 + 1;
    write_shard(&shards_dir, "all1", vocab.size() as u32, &vectorized[..half]).unwrap();
    write_shard(&shards_dir, "all2", vocab.size() as u32, &vectorized[half..]).unwrap();

    let store = ShardStore::open(&shards_dir).unwrap();
    let labels: Vec<String> = ["biochemistry", "nutrition", "virology"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let classifier =
        NaiveBayesClassifier::train(&store, &labels, Some("all".to_string()), 1e-2).unwrap();
    classifier.save(&dir.join("classifier.bin")).unwrap();
}

/// A bundle in a temp dir plus a config pointing at it. Keep the TempDir
/// alive for as long as the engine runs.
#[allow(dead_code)]
pub fn fixture() -> (tempfile::TempDir, EngineConfig) {
    let dir = tempfile::tempdir().unwrap();
    build_bundle(dir.path());
    let mut config = EngineConfig::new(dir.path());
    config.query_cat = 2;
    (dir, config)
}

#[allow(dead_code)]
pub fn load_vocab(dir: &Path) -> Vocabulary {
    Vocabulary::load(&dir.join("vocab.bin")).unwrap()
}
