//! Basic usage example - inspect a training workspace

use vctrain_core::{PretrainedRole, Result, TrainerApi};

#[tokio::main]
async fn main() -> Result<()> {
    // Get path from args or use current directory
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./example-workspace".to_string());

    println!("Initializing TrainerApi with path: {}", path);

    let api = TrainerApi::builder(&path)
        .auto_create_dirs(true)
        .build()
        .await?;

    let gpu = api.get_gpu_info().await?;
    println!("{}", gpu.info_text);
    println!("Suggested batch size: {}", gpu.default_batch_size);

    let datasets = api.list_datasets();
    if datasets.is_empty() {
        println!("No datasets found.");
    } else {
        println!("Found {} datasets:", datasets.len());
        for dataset in datasets {
            println!("  - {}", dataset);
        }
    }

    for role in [PretrainedRole::Generator, PretrainedRole::Discriminator] {
        println!("Custom {:?} weights: {:?}", role, api.list_pretrained(role));
    }

    for name in api.list_projects()? {
        let info = api.project_info(&name)?;
        println!(
            "Project {}: preprocessed={}, checkpoints={}",
            info.name,
            info.preprocessed,
            info.checkpoints.len()
        );
    }

    Ok(())
}
