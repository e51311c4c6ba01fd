// Thin harness around the parallax library.
//
// Wires a ctrl-c handler to the runner's stop token and drives a small
// self-contained bandit task through the collaborator interfaces, so the
// whole loop (schedule, workers, shared store, counter, checkpoint) can
// be exercised from the command line.

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use parallax::{
    ConsoleLogger, CsvLogger, Environment, Learner, MultiLogger, RmsPropApplier, Runner,
    StepOutcome, TrainConfig, WorkError, WorkUnit,
};

/// Command-line arguments for the training harness.
#[derive(Parser, Debug)]
#[command(name = "train")]
struct Cli {
    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Global step budget.
    #[arg(long, default_value_t = 100_000)]
    step_budget: u64,

    /// Low bound of the per-worker initial learning-rate range.
    #[arg(long, default_value_t = 1e-4)]
    rate_low: f64,

    /// High bound of the per-worker initial learning-rate range.
    #[arg(long, default_value_t = 5e-3)]
    rate_high: f64,

    /// Checkpoint directory.
    #[arg(long, default_value = "./checkpoints")]
    checkpoint_dir: PathBuf,

    /// Ignore any existing checkpoint and start a fresh lineage.
    #[arg(long)]
    start_fresh: bool,

    /// Optional CSV file for progress snapshots.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Number of bandit arms in the demo task.
    #[arg(long, default_value_t = 10)]
    arms: usize,

    /// Environment steps per unit of work.
    #[arg(long, default_value_t = 20)]
    horizon: u64,
}

/// Stateless multi-armed bandit with noisy arm payouts.
struct BanditEnv {
    means: Vec<f32>,
    rng: fastrand::Rng,
    steps_in_episode: u64,
    horizon: u64,
}

impl BanditEnv {
    fn new(arms: usize, horizon: u64, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let means = (0..arms).map(|_| rng.f32()).collect();
        Self {
            means,
            rng,
            steps_in_episode: 0,
            horizon,
        }
    }
}

impl Environment for BanditEnv {
    fn reset(&mut self) -> Vec<f32> {
        self.steps_in_episode = 0;
        vec![1.0]
    }

    fn step(&mut self, action: usize) -> StepOutcome {
        self.steps_in_episode += 1;
        let noise = self.rng.f32() * 0.1 - 0.05;
        StepOutcome::new(
            vec![1.0],
            self.means[action] + noise,
            self.steps_in_episode >= self.horizon,
        )
    }

    fn action_size(&self) -> usize {
        self.means.len()
    }
}

/// REINFORCE over softmax logits, one episode per unit of work.
struct SoftmaxLearner {
    env: BanditEnv,
    rng: fastrand::Rng,
    baseline: f32,
}

impl SoftmaxLearner {
    fn new(env: BanditEnv, seed: u64) -> Self {
        Self {
            env,
            rng: fastrand::Rng::with_seed(seed),
            baseline: 0.0,
        }
    }

    fn policy(logits: &[f32]) -> Vec<f32> {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    fn sample(&mut self, probs: &[f32]) -> usize {
        let draw = self.rng.f32();
        let mut cumulative = 0.0;
        for (action, &p) in probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return action;
            }
        }
        probs.len() - 1
    }
}

impl Learner for SoftmaxLearner {
    fn unit_of_work(&mut self, params: &[f32], _learning_rate: f64) -> Result<WorkUnit, WorkError> {
        if params.len() != self.env.action_size() {
            return Err(WorkError::Model(format!(
                "expected {} logits, got {}",
                self.env.action_size(),
                params.len()
            )));
        }

        let probs = Self::policy(params);
        let mut gradients = vec![0.0f32; params.len()];
        let mut episode_return = 0.0f32;
        let mut steps = 0u64;

        self.env.reset();
        loop {
            let action = self.sample(&probs);
            let outcome = self.env.step(action);
            steps += 1;
            episode_return += outcome.reward;

            // REINFORCE with a running baseline: d(-log pi)/d(logit_k)
            // is (pi_k - onehot_k), scaled by the advantage.
            let advantage = outcome.reward - self.baseline;
            for (k, grad) in gradients.iter_mut().enumerate() {
                let indicator = if k == action { 1.0 } else { 0.0 };
                *grad += (probs[k] - indicator) * advantage;
            }

            if outcome.done {
                break;
            }
        }

        self.baseline = 0.99 * self.baseline + 0.01 * (episode_return / steps as f32);

        Ok(WorkUnit::new(gradients, steps).with_score(episode_return / steps as f32))
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = TrainConfig::new()
        .with_parallelism(cli.workers)
        .with_step_budget(cli.step_budget)
        .with_rate_range(cli.rate_low, cli.rate_high)
        .with_checkpoint_dir(&cli.checkpoint_dir)
        .with_start_fresh(cli.start_fresh);

    let runner = Runner::new(config)?;

    let stop = runner.stop_token();
    ctrlc::set_handler(move || {
        if stop.request_stop() {
            info!("interrupt received; workers will stop at their next unit boundary");
        }
    })?;

    let mut logger = MultiLogger::new().add(Box::new(ConsoleLogger::new()));
    if let Some(path) = &cli.csv {
        logger = logger.add(Box::new(CsvLogger::create(path)?));
    }

    // RMSProp settings tuned for asynchronous contributors: heavy decay,
    // large epsilon, clipped global norm.
    let applier = Arc::new(RmsPropApplier::new(0.99, 0.1).with_clip_norm(40.0));

    let arms = cli.arms;
    let horizon = cli.horizon;
    let summary = runner.run(
        vec![0.0; arms],
        applier,
        |ctx| {
            let seed = ctx.index as u64;
            SoftmaxLearner::new(BanditEnv::new(arms, horizon, seed), seed.wrapping_add(1))
        },
        &mut logger,
    )?;

    info!(
        "finished at step {} (wall time {:.1}s), checkpoint tagged {}",
        summary.final_step,
        summary.wall_time.as_secs_f64(),
        summary.checkpoint.step
    );
    for report in &summary.reports {
        info!(
            "worker {}: {:?}, {} steps over {} units, {:.1}s lineage time",
            report.index,
            report.outcome,
            report.steps_contributed,
            report.units_completed,
            report.elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
