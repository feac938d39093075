//! Demo binary: prints a summary of an AcqKnowledge file's header graph.
//!
//! Not a shipped converter — just enough to eyeball that a file walked
//! correctly while developing against real recordings.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(author, version, about = "Summarise a BIOPAC AcqKnowledge (.acq) file")]
struct Args {
    /// Path to the .acq file to inspect.
    path: PathBuf,

    /// Also materialise and print the first few samples of each channel.
    #[arg(long)]
    show_samples: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let datafile = if args.show_samples {
        acqknowledge::read_file_path(&args.path)
    } else {
        let file = std::fs::File::open(&args.path).expect("open file");
        let (datafile, _iterator) = acqknowledge::open_file(file).expect("walk header graph");
        Ok(datafile)
    };

    let datafile = match datafile {
        Ok(df) => df,
        Err(e) => {
            eprintln!("failed to read {}: {e}", args.path.display());
            std::process::exit(1);
        }
    };

    println!("file revision: {}", datafile.file_revision);
    println!("compressed: {}", datafile.is_compressed);
    println!("byte order: {:?}", datafile.byte_order);
    println!("base rate: {} Hz", datafile.samples_per_second);
    println!("string encoding: {:?}", datafile.encoding);
    println!("channels: {}", datafile.channels.len());
    for channel in &datafile.channels {
        println!(
            "  #{:<3} {:<20} {:>10.3} Hz  {:>9} samples  ({:?})",
            channel.order_num,
            channel.name,
            channel.samples_per_second(),
            channel.point_count,
            channel.sample_dtype,
        );
        if args.show_samples {
            let preview: Vec<f64> = channel.data().into_iter().take(5).collect();
            println!("       first samples: {preview:?}");
        }
    }

    println!("markers: {}", datafile.markers.len());
    for marker in datafile.markers.iter().take(10) {
        let channel_desc = if marker.is_global() {
            "global".to_string()
        } else {
            format!("channel {}", marker.channel_number)
        };
        println!(
            "  [{}] {} ({}) @ sample {}",
            channel_desc, marker.label, marker.type_name, marker.global_sample_index
        );
    }

    if !datafile.journal.text.is_empty() {
        println!("journal: {} bytes ({})", datafile.journal.text.len(), if datafile.journal.is_html { "html" } else { "plain" });
    }

    if !datafile.warnings.is_empty() {
        println!("warnings:");
        for warning in &datafile.warnings {
            println!("  {warning:?}");
        }
    }
}
