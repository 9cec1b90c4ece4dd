use anyhow::bail;
use clap::Parser;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use nn_layers::error::LayerError;
use nn_layers::gradient_check::{GradientChecker, uniform_blob};
use nn_layers::layer::forward_blobs;
use nn_layers::layers::{joint_to_conditional, mean_across_bottoms, noisy_comb};
use nn_layers::registry::LayerRegistry;
use nn_layers::shape::Shape;
use nn_layers::tensor::{Blob, shapes};

#[derive(clap::Parser)]
struct Args {
    /// Only check this layer type, by default all registered types are checked.
    #[clap(short, long)]
    layer: Option<String>,
    /// Parameter string passed to every layer.
    #[clap(long, default_value = "")]
    params: String,

    #[clap(long, default_value_t = 4)]
    classes: usize,
    #[clap(long, default_value_t = 100)]
    seed: u64,

    #[clap(long, default_value_t = 1e-3)]
    step: f32,
    #[clap(long, default_value_t = 1e-2)]
    threshold: f32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let registry = LayerRegistry::with_builtin();
    let checker = GradientChecker::new(args.step, args.threshold);
    let mut rng = StdRng::seed_from_u64(args.seed);

    let type_names = match &args.layer {
        Some(layer) => vec![layer.as_str()],
        None => registry.type_names(),
    };

    let mut failed = vec![];

    for type_name in type_names {
        let mut layer = registry.create(type_name, &args.params)?;

        let (bottom, top_count) = match sample_bottom(type_name, args.classes, &mut rng) {
            Some(sample) => sample,
            None => bail!("No sample inputs known for layer type {:?}", type_name),
        };

        layer.setup(&shapes(&bottom), top_count)?;
        let top = forward_blobs(layer.as_ref(), &bottom)?;
        println!("{}: {:?} -> {:?}", type_name, shapes(&bottom), shapes(&top));

        let check = (0..bottom.len()).collect_vec();
        match checker.check(layer.as_ref(), &bottom, &check) {
            Ok(report) => {
                println!(
                    "  checked {} elements, max error {}, {} failures",
                    report.checked, report.max_error, report.failures.len(),
                );
                for failure in report.failures.iter().take(8) {
                    println!("    {:?}", failure);
                }
                if !report.passed() {
                    failed.push(type_name);
                }
            }
            Err(LayerError::UnsupportedOperation { .. }) => {
                println!("  not differentiable, skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !failed.is_empty() {
        bail!("Gradient check failed for {:?}", failed);
    }

    Ok(())
}

/// Random bottoms in the range each layer expects, together with the number of tops.
fn sample_bottom(type_name: &str, classes: usize, rng: &mut StdRng) -> Option<(Vec<Blob>, usize)> {
    let image = Shape::fixed(&[1, classes, 8, 8]);

    let sample = match type_name {
        mean_across_bottoms::TYPE_NAME => {
            let bottom = (0..mean_across_bottoms::FORWARD_BOTTOM_COUNT)
                .map(|_| uniform_blob(&image, -1.0, 1.0, rng))
                .collect_vec();
            (bottom, 1)
        }
        noisy_comb::TYPE_NAME => {
            let mut bottom = (0..noisy_comb::BOTTOM_COUNT)
                .map(|_| uniform_blob(&image, -1.0, 1.0, rng))
                .collect_vec();
            bottom[noisy_comb::P] = uniform_blob(&image, 0.0, 1.0, rng);
            (bottom, 1)
        }
        joint_to_conditional::TYPE_NAME => {
            let joint = Shape::fixed(&[1, classes, 4, 1]);
            (vec![uniform_blob(&joint, 0.2, 1.0, rng)], joint_to_conditional::TOP_COUNT)
        }
        _ => return None,
    };

    Some(sample)
}
