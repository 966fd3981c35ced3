//! Prints the ChartSync CustomResourceDefinitions as a multi-document YAML stream.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crds.yaml
//! ```

use crds::{Component, Repository};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [Repository::crd(), Component::crd()];
    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
