use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the generator and discriminator, resuming from the newest checkpoint
    Train {
        /// Override the number of epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Override the learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Override the batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Score the patches of frames with the newest checkpoint
    Score {
        /// Frame image files
        #[arg(long, required = true, num_args = 1..)]
        frames: Vec<PathBuf>,

        /// One 0/1 flag per frame (1 = anomalous) to report detection metrics
        #[arg(long, num_args = 1..)]
        labels: Option<Vec<u8>>,
    },
    /// Print the model key, parameter counts and saved checkpoints
    Inspect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_overrides() {
        let cli = Cli::parse_from(["novelty-detector", "--debug", "train", "--epochs", "3"]);
        assert!(cli.debug);
        match cli.command {
            Command::Train { epochs, learning_rate, batch_size } => {
                assert_eq!(epochs, Some(3));
                assert_eq!(learning_rate, None);
                assert_eq!(batch_size, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_score_frames_and_labels() {
        let cli = Cli::parse_from([
            "novelty-detector", "-c", "cfg.toml", "score", "--frames", "a.tif", "b.tif", "--labels", "0", "1",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
        match cli.command {
            Command::Score { frames, labels } => {
                assert_eq!(frames.len(), 2);
                assert_eq!(labels, Some(vec![0, 1]));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_score_requires_frames() {
        assert!(Cli::try_parse_from(["novelty-detector", "score"]).is_err());
    }
}
