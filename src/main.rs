//! Single-team football outcome prediction CLI
//!
//! Builds leakage-safe form and odds features from league match files,
//! trains a Win/Draw/Loss classifier and serves predictions from it.

use clap::{ArgGroup, Parser, Subcommand};
use matchform::features::FeatureSchema;
use matchform::{Config, Result};

#[derive(Parser)]
#[command(name = "matchform")]
#[command(about = "Win/Draw/Loss prediction for a single football team", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Load match files, label and featurize them, and report exclusions
    Build {
        /// Feature schema (form, form_odds, form_odds_plus)
        #[arg(long)]
        schema: Option<FeatureSchema>,
        /// Write the feature table to this CSV file
        #[arg(long)]
        output: Option<String>,
    },
    /// Train, evaluate on the chronological test split, and save the model
    Train {
        /// Feature schema (form, form_odds, form_odds_plus)
        #[arg(long)]
        schema: Option<FeatureSchema>,
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override learning rate
        #[arg(long)]
        lr: Option<f64>,
        /// Train multinomial logistic regression (no hidden layers)
        #[arg(long)]
        linear: bool,
    },
    /// Compare feature schemas and model shapes on the same test rows
    Compare {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Expanding-window cross-validation
    Cv {
        /// Number of folds
        #[arg(long)]
        folds: Option<usize>,
        /// Feature schema (form, form_odds, form_odds_plus)
        #[arg(long)]
        schema: Option<FeatureSchema>,
    },
    /// Predict the outcome of the team's next match
    #[command(group(
        ArgGroup::new("form_input")
            .required(true)
            .args(["last5", "last5_scores", "form_points"])
    ))]
    Predict {
        /// The team plays at home
        #[arg(long)]
        is_home: bool,
        /// Decimal odds for the team winning
        #[arg(long)]
        odds_win: f64,
        /// Decimal odds for a draw
        #[arg(long)]
        odds_draw: f64,
        /// Decimal odds for the team losing
        #[arg(long)]
        odds_loss: f64,
        /// Most recent results, e.g. W,W,D,L,W
        #[arg(long)]
        last5: Option<String>,
        /// Most recent scorelines with the team's goals first, e.g. 2-1,0-0,1-2,3-0,1-1
        #[arg(long)]
        last5_scores: Option<String>,
        /// Points over the window (explicit mode)
        #[arg(long, requires_all = ["goals_for", "goals_against", "goal_diff", "win_rate"])]
        form_points: Option<f64>,
        #[arg(long, requires = "form_points")]
        goals_for: Option<f64>,
        #[arg(long, requires = "form_points")]
        goals_against: Option<f64>,
        #[arg(long, requires = "form_points")]
        goal_diff: Option<f64>,
        #[arg(long, requires = "form_points")]
        win_rate: Option<f64>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Build { schema, output } => commands::build(&config, schema, output),
        Commands::Train {
            schema,
            epochs,
            lr,
            linear,
        } => commands::train(&config, schema, epochs, lr, linear),
        Commands::Compare { epochs } => commands::compare(&config, epochs),
        Commands::Cv { folds, schema } => commands::cross_validate(&config, folds, schema),
        Commands::Predict {
            is_home,
            odds_win,
            odds_draw,
            odds_loss,
            last5,
            last5_scores,
            form_points,
            goals_for,
            goals_against,
            goal_diff,
            win_rate,
            format,
        } => commands::FormArgs {
            last5,
            last5_scores,
            explicit: form_points.map(|p| [
                p,
                goals_for.unwrap_or_default(),
                goals_against.unwrap_or_default(),
                goal_diff.unwrap_or_default(),
                win_rate.unwrap_or_default(),
            ]),
        }
        .into_input()
        .and_then(|form| {
            let request = matchform::features::PredictionRequest {
                is_home,
                odds_win,
                odds_draw,
                odds_loss,
                form,
            };
            commands::predict(&config, &request, format)
        }),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use matchform::data::{DatasetSplitter, FeatureTable, LabeledSample, MatchTable};
    use matchform::features::{FormInput, FormSnapshot, PredictionRequest};
    use matchform::model::bundle::read_manifest;
    use matchform::model::{BundleInfo, MlpClassifier, ModelBundle};
    use matchform::predict::{format_prediction, Predictor};
    use matchform::training::OutcomeTrainer;
    use matchform::FormError;
    use std::collections::HashSet;
    use std::path::Path;

    type ServeBackend = NdArray<f32>;
    type TrainBackend = Autodiff<ServeBackend>;

    pub struct FormArgs {
        pub last5: Option<String>,
        pub last5_scores: Option<String>,
        pub explicit: Option<[f64; 5]>,
    }

    impl FormArgs {
        /// Exactly one mode is guaranteed by the clap argument group
        pub fn into_input(self) -> Result<FormInput> {
            if let Some(streak) = self.last5 {
                return Ok(FormInput::parse_streak(&streak)?);
            }
            if let Some(scores) = self.last5_scores {
                return Ok(FormInput::parse_scorelines(&scores)?);
            }
            let [form_points, goals_for, goals_against, goal_diff, win_rate] = self
                .explicit
                .ok_or_else(|| FormError::Config("No form input supplied".to_string()))?;
            Ok(FormInput::Explicit(FormSnapshot {
                form_points,
                goals_for,
                goals_against,
                goal_diff,
                win_rate,
            }))
        }
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all(&config.data.raw_dir)?;
        std::fs::create_dir_all(&config.data.bundle_dir)?;
        println!(
            "Created {}/ and {}/ directories",
            config.data.raw_dir, config.data.bundle_dir
        );

        println!("\nNext steps:");
        println!(
            "  1. Copy season files ({}*.csv) into {}",
            config.data.file_prefix, config.data.raw_dir
        );
        println!("  2. Edit {} to choose the team and schema", config_path);
        println!("  3. Run 'matchform train' to train the model");
        println!("  4. Run 'matchform predict --is-home --odds-win 1.8 --odds-draw 3.6 --odds-loss 4.5 --last5 W,W,D,L,W'");

        Ok(())
    }

    fn load_features(config: &Config, schema: FeatureSchema) -> Result<FeatureTable> {
        let table = MatchTable::load_dir(
            Path::new(&config.data.raw_dir),
            &config.data.file_prefix,
            &config.data.bookmaker,
        )?;
        println!("Loaded {} league matches", table.len());

        let features = FeatureTable::from_league(
            &table,
            &config.features.team,
            schema,
            config.features.window,
        )?;
        println!(
            "{}: {} usable matches ({} schema), {}",
            config.features.team,
            features.len(),
            schema,
            features.exclusions()
        );
        Ok(features)
    }

    pub fn build(config: &Config, schema: Option<FeatureSchema>, output: Option<String>) -> Result<()> {
        let schema = schema.unwrap_or(config.features.schema);
        let features = load_features(config, schema)?;

        let [loss, draw, win] = features.class_counts();
        println!("  Outcomes: {} W / {} D / {} L", win, draw, loss);
        if let (Some(first), Some(last)) = (features.samples().first(), features.samples().last()) {
            println!("  Date range: {} to {}", first.date, last.date);
        }
        println!("  Columns: {}", features.feature_names().join(", "));

        if let Some(path) = output {
            features.write_csv(std::fs::File::create(&path)?)?;
            println!("Wrote feature table to {}", path);
        }
        Ok(())
    }

    fn training_config(
        config: &Config,
        epochs: Option<usize>,
        lr: Option<f64>,
        linear: bool,
    ) -> matchform::TrainingConfig {
        let mut training = config.training.clone();
        if let Some(epochs) = epochs {
            training.epochs = epochs;
        }
        if let Some(lr) = lr {
            training.learning_rate = lr;
        }
        if linear {
            training.hidden_dims.clear();
        }
        training
    }

    pub fn train(
        config: &Config,
        schema: Option<FeatureSchema>,
        epochs: Option<usize>,
        lr: Option<f64>,
        linear: bool,
    ) -> Result<()> {
        let schema = schema.unwrap_or(config.features.schema);
        let features = load_features(config, schema)?;
        let splitter = DatasetSplitter::new(config.training.train_fraction)?;
        let (train, test) = features.split(&splitter)?;
        println!("Train: {} rows, test: {} rows", train.len(), test.len());

        let trainer = OutcomeTrainer::<TrainBackend>::new(
            Default::default(),
            training_config(config, epochs, lr, linear),
        );
        let (classifier, eval) = trainer.fit_and_evaluate(&train, &test)?;
        println!("\nTest set evaluation\n───────────────────────────────\n{}", eval);

        let bundle = ModelBundle::new(
            classifier,
            schema,
            features.window(),
            features.feature_names(),
            trainer.label_map().clone(),
            BundleInfo {
                team: config.features.team.clone(),
                train_rows: train.len(),
                test_accuracy: Some(eval.accuracy),
                trained_at: Some(chrono::Utc::now()),
            },
        )?;
        bundle.save(Path::new(&config.data.bundle_dir))?;
        println!("Model saved to {}", config.data.bundle_dir);
        Ok(())
    }

    pub fn compare(config: &Config, epochs: Option<usize>) -> Result<()> {
        let tables = FeatureSchema::ALL
            .iter()
            .map(|&schema| load_features(config, schema))
            .collect::<Result<Vec<_>>>()?;

        // Restrict every schema to the matches the strictest one kept
        let key = |s: &LabeledSample| (s.date, s.opponent.clone());
        let common: HashSet<_> = tables
            .iter()
            .map(|t| t.samples().iter().map(key).collect::<HashSet<_>>())
            .reduce(|a, b| a.intersection(&b).cloned().collect())
            .unwrap_or_default();

        let splitter = DatasetSplitter::new(config.training.train_fraction)?;
        println!(
            "\n{:<16} {:<10} {:>10} {:>10} {:>10}",
            "Schema", "Model", "Accuracy", "Macro F1", "Log loss"
        );
        println!("{}", "─".repeat(60));

        for table in &tables {
            let rows: Vec<LabeledSample> = table
                .samples()
                .iter()
                .filter(|s| common.contains(&key(s)))
                .cloned()
                .collect();
            let (train, test) = splitter.split_checked(&rows)?;

            for (name, linear) in [("logistic", true), ("mlp", false)] {
                let trainer = OutcomeTrainer::<TrainBackend>::new(
                    Default::default(),
                    training_config(config, epochs, None, linear),
                );
                let (_, eval) = trainer.fit_and_evaluate(&train, &test)?;
                println!(
                    "{:<16} {:<10} {:>9.2}% {:>10.3} {:>10.4}",
                    table.schema().to_string(),
                    name,
                    eval.accuracy * 100.0,
                    eval.macro_f1,
                    eval.log_loss.unwrap_or(f64::NAN)
                );
            }
        }
        Ok(())
    }

    pub fn cross_validate(
        config: &Config,
        folds: Option<usize>,
        schema: Option<FeatureSchema>,
    ) -> Result<()> {
        let schema = schema.unwrap_or(config.features.schema);
        let folds = folds.unwrap_or(config.training.cv_folds);
        let features = load_features(config, schema)?;

        let trainer = OutcomeTrainer::<TrainBackend>::new(Default::default(), config.training.clone());
        let evals = trainer.cross_validate(features.samples(), folds)?;

        println!("\nTime-series cross-validation ({} folds)", folds);
        println!("───────────────────────────────");
        for (k, eval) in evals.iter().enumerate() {
            println!(
                "  Fold {}: accuracy {:.2}%, macro F1 {:.3}, n = {}",
                k + 1,
                eval.accuracy * 100.0,
                eval.macro_f1,
                eval.total
            );
        }
        let n = evals.len() as f64;
        let mean = evals.iter().map(|e| e.accuracy).sum::<f64>() / n;
        let sd = (evals.iter().map(|e| (e.accuracy - mean).powi(2)).sum::<f64>() / n).sqrt();
        println!("  Mean accuracy: {:.2}% ± {:.2}%", mean * 100.0, sd * 100.0);
        Ok(())
    }

    pub fn predict(config: &Config, request: &PredictionRequest, format: OutputFormat) -> Result<()> {
        let bundle = ModelBundle::<MlpClassifier<ServeBackend>>::load(
            Path::new(&config.data.bundle_dir),
            &Default::default(),
        )?;
        let team = bundle.info().team.clone();
        let predictor = Predictor::new(bundle)?;
        let response = predictor.predict(request)?;

        match format {
            OutputFormat::Table => {
                print!("{}", format_prediction(&response, &team, request.is_home));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }
        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let manifest = read_manifest(Path::new(&config.data.bundle_dir))?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:           {}", config.data.bundle_dir);
        println!("  Team:           {}", manifest.info.team);
        println!("  Schema:         {}", manifest.schema);
        println!("  Window:         {}", manifest.window);
        println!("  Hidden layers:  {:?}", manifest.net.hidden_dims);
        println!("  Train rows:     {}", manifest.info.train_rows);
        if let Some(acc) = manifest.info.test_accuracy {
            println!("  Test accuracy:  {:.2}%", acc * 100.0);
        }
        if let Some(at) = manifest.info.trained_at {
            println!("  Trained at:     {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
        println!("  Features:");
        for name in &manifest.feature_names {
            println!("    {}", name);
        }
        Ok(())
    }
}
