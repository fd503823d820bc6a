use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

/// Generate n random documents to use in the benchmark.
///
/// Every leaf is a string so the same data drives all engines: flags are
/// `"yes"` or `""`. Field names are camel case because `_` ends a mailplate
/// variable name.
pub fn generate_random_documents(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    let mut documents = Vec::with_capacity(n);

    for _ in 0..n {
        let name = random_string(&mut rng, 5, 10);
        let age = rng.random_range(18..80).to_string();
        let active = flag(&mut rng, 0.7);

        let items_count = rng.random_range(3..10);
        let mut items = Vec::with_capacity(items_count);
        for _ in 0..items_count {
            let title = random_string(&mut rng, 3, 8);
            let value = rng.random_range(10..1000).to_string();
            items.push(json!({
                "title": title,
                "value": value,
                "special": flag(&mut rng, 0.3)
            }));
        }

        documents.push(json!({
            "name": name,
            "age": age,
            "active": active,
            "items": items,
            "showDetails": flag(&mut rng, 0.8),
            "hasAccess": flag(&mut rng, 0.6),
        }));
    }

    documents
}

fn flag(rng: &mut StdRng, p: f64) -> &'static str {
    if rng.random_bool(p) { "yes" } else { "" }
}

/// Generate a random string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let charset = "abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(min_len..=max_len);

    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..charset.len());
            charset.chars().nth(idx).unwrap()
        })
        .collect()
}

/// Prints the size of the running bench binary, to compare engine footprints.
pub fn print_binary_size() {
    let path = std::env::current_exe().unwrap();
    let bytes = std::fs::metadata(&path).unwrap().len();
    println!(
        "Binary size: {:.1} KiB ({} bytes) for {}",
        bytes as f64 / 1024.0,
        bytes,
        path.display()
    );
}
