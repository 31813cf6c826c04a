extern crate ansi_term;
extern crate chrono;
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate error_chain;
extern crate studyplan;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ansi_term::{Colour, Style};
use chrono::NaiveDate;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use studyplan::cards::{self, CardService, GeminiClient, GeminiConfig};
use studyplan::errors::*;
use studyplan::{files, plan, reader, PlanOptions, SchedulePlan};

/// Describes all the styles that can be used in printing text.
/// Mostly just good for disabling custom formatting.
#[derive(Debug, Clone)]
struct StyleSet {
    /// Normal text
    normal: Style,
    /// Title text (topics, questions, plan names)
    title: Style,
    /// Description (or label) text
    description: Style,
    /// Dates
    date: Style,
    /// Error text
    error: Style,
}

impl StyleSet {
    /// Preset for the --no-ansi option (no style)
    fn no_ansi() -> StyleSet {
        StyleSet {
            normal: Style::new(),
            title: Style::new(),
            description: Style::new(),
            date: Style::new(),
            error: Style::new(),
        }
    }

    /// Preset for the normal "fancy" style
    fn fancy() -> StyleSet {
        StyleSet {
            normal: Style::new(),
            title: Colour::White.bold(),
            description: Style::new().italic(),
            date: Colour::Cyan.normal(),
            error: Colour::Red.normal(),
        }
    }
}

/// Returns styled text (using a format string syntax)
macro_rules! style {
    ($style:expr, $($arg:tt)*) => {
        {{
            $style.paint(format!( $($arg)*) )
        }}
    }
}

/// Prints a line of text in the given style
macro_rules! styleln {
    ($style:expr, $($arg:tt)*) => {
        println!("{}", style!($style, $($arg)*))
    }
}

/// Arguments shared by the subcommands that talk to the generation model.
fn model_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(Arg::with_name("api-key")
            .long("api-key")
            .value_name("KEY")
            .help("The Gemini API key (defaults to $GEMINI_API_KEY)")
            .takes_value(true))
        .arg(Arg::with_name("model")
            .long("model")
            .value_name("MODEL")
            .help("The Gemini model to use (defaults to $GEMINI_MODEL or gemini-2.0-flash)")
            .takes_value(true))
}

/// Arguments for reading a PDF and picking one chunk of it.
fn pdf_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(Arg::with_name("PDF")
            .help("The PDF to read")
            .required(true))
        .arg(Arg::with_name("chunk-size")
            .short("s")
            .long("chunk-size")
            .value_name("WORDS")
            .default_value("700")
            .help("The maximum number of words in a chunk")
            .takes_value(true))
}

fn chunk_arg<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(Arg::with_name("chunk")
        .short("c")
        .long("chunk")
        .value_name("N")
        .default_value("1")
        .help("Which chunk (starting from 1) to generate from")
        .takes_value(true))
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = App::new("studyplan")
        .version("0.1.0")
        .author("Ian Johnson <ianprime0509@gmail.com>")
        .about("A study assistant: revision plans, flashcards and quizzes")
        .setting(AppSettings::ColoredHelp)
        .arg(Arg::with_name("no-ansi")
            .help("Disables fancy text output")
            .short("n")
            .long("no-ansi"))
        .subcommand(SubCommand::with_name("plan")
            .about("Computes and saves a revision plan for a list of topics")
            .arg(Arg::with_name("TOPIC")
                .help("The topics to schedule, in order")
                .multiple(true)
                .required_unless("file"))
            .arg(Arg::with_name("file")
                .short("f")
                .long("file")
                .value_name("FILE")
                .help("Read topics from a text file, one per line")
                .takes_value(true))
            .arg(Arg::with_name("start")
                .long("start")
                .value_name("DATE")
                .help("The first study day, as YYYY-MM-DD (defaults to today)")
                .takes_value(true))
            .arg(Arg::with_name("gap")
                .short("g")
                .long("gap")
                .value_name("DAYS")
                .default_value("2")
                .help("The number of days between topics")
                .takes_value(true))
            .arg(Arg::with_name("no-revision")
                .long("no-revision")
                .help("Don't schedule review sessions"))
            .arg(Arg::with_name("include-weekends")
                .long("include-weekends")
                .help("Allow sessions on Saturdays and Sundays"))
            .arg(Arg::with_name("name")
                .long("name")
                .value_name("NAME")
                .help("The name to save the plan under")
                .conflicts_with("output")
                .takes_value(true))
            .arg(Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("OUTPUT")
                .help("Save the plan to this file instead of the plans directory")
                .takes_value(true))
            .after_help("Each topic is studied GAP days after the previous one, and reviewed two \
                         and five days after it is studied. Unless --include-weekends is given, \
                         study days move forward to the next weekday and reviews that land on a \
                         weekend move to the following Monday. Without --name or --output the \
                         plan is saved as 'planner'."))
        .subcommand(SubCommand::with_name("show")
            .about("Shows a saved revision plan")
            .arg(Arg::with_name("PLAN")
                .help("The name of the plan to show")
                .required(true)))
        .subcommand(SubCommand::with_name("list").about("Lists all saved revision plans"))
        .subcommand(SubCommand::with_name("remove")
            .about("Removes a saved revision plan")
            .arg(Arg::with_name("PLAN")
                .help("The name of the plan to remove")
                .required(true)))
        .subcommand(pdf_args(SubCommand::with_name("extract")
            .about("Extracts the text of a PDF and shows how it is chunked")))
        .subcommand(model_args(chunk_arg(pdf_args(SubCommand::with_name("flashcards")
            .about("Generates flashcards from a chunk of a PDF")))))
        .subcommand(model_args(chunk_arg(pdf_args(SubCommand::with_name("quiz")
                .about("Generates a multiple-choice quiz from a chunk of a PDF"))))
            .arg(Arg::with_name("title")
                .short("t")
                .long("title")
                .value_name("TITLE")
                .default_value("Study Notes")
                .help("A title for the material, given to the model as context")
                .takes_value(true)))
        .subcommand(model_args(pdf_args(SubCommand::with_name("study")
                .about("Extracts a PDF, generates flashcards and a quiz, and plans revision")))
            .arg(Arg::with_name("topic")
                .long("topic")
                .value_name("TOPIC")
                .multiple(true)
                .number_of_values(1)
                .help("A topic to schedule (may be repeated)")
                .takes_value(true)))
        .after_help("To get started, use `studyplan plan` with a few topics, or `studyplan study` \
                     with a PDF of your notes. Card generation needs a Gemini API key in \
                     GEMINI_API_KEY.")
        .get_matches();

    // Whether we should disable the fancy ANSI terminal text
    let no_ansi = matches.is_present("no-ansi");
    // The style to use
    let style_set = if no_ansi {
        StyleSet::no_ansi()
    } else {
        StyleSet::fancy()
    };

    // Handle errors nicely
    if let Err(ref e) = run(matches, &style_set) {
        styleln!(style_set.error, "Error: {}", e);

        for e in e.iter().skip(1) {
            styleln!(style_set.error, "Caused by: {}", e);
        }

        if let Some(backtrace) = e.backtrace() {
            styleln!(style_set.error, "Backtrace: {:?}", backtrace);
        }

        std::process::exit(1);
    }
}

/// The main program logic.
/// Each subcommand should do its own printing, except for errors, which are returned.
fn run(m: ArgMatches, style_set: &StyleSet) -> Result<()> {
    match m.subcommand() {
        ("plan", Some(sub_m)) => plan(sub_m, style_set),
        ("show", Some(sub_m)) => show(sub_m, style_set),
        ("list", Some(_)) => list(style_set),
        ("remove", Some(sub_m)) => remove(sub_m, style_set),
        ("extract", Some(sub_m)) => extract(sub_m, style_set),
        ("flashcards", Some(sub_m)) => flashcards(sub_m, style_set),
        ("quiz", Some(sub_m)) => quiz(sub_m, style_set),
        ("study", Some(sub_m)) => study(sub_m, style_set),
        _ => list(style_set),
    }
}

/// Parses a numeric argument that has a default value. Values that don't
/// fit the target type are rejected rather than truncated.
fn number_arg<T>(m: &ArgMatches, name: &str) -> Result<T>
    where T: FromStr,
          T::Err: std::error::Error + Send + 'static
{
    let value = m.value_of(name).unwrap_or_default();
    value.parse().chain_err(|| ErrorKind::InvalidInput(format!("invalid numeric argument to `--{}`", name)))
}

/// Builds the card service from the command line or the environment.
fn card_service(m: &ArgMatches) -> Result<CardService<GeminiClient>> {
    let mut config = match m.value_of("api-key") {
        Some(key) => GeminiConfig::new(key),
        None => GeminiConfig::from_env()?,
    };
    if let Some(model) = m.value_of("model") {
        config = config.model(model);
    }
    Ok(CardService::new(GeminiClient::new(config)?))
}

/// Reads the PDF argument and splits it into chunks.
fn read_chunks(m: &ArgMatches) -> Result<Vec<String>> {
    let path = Path::new(m.value_of("PDF").unwrap_or_default());
    let size: usize = number_arg(m, "chunk-size")?;
    let text = reader::extract_text(path).chain_err(|| "could not read PDF")?;
    Ok(reader::split_chunks(&text, size))
}

/// Picks the chunk selected by `--chunk`.
fn selected_chunk<'c>(m: &ArgMatches, chunks: &'c [String]) -> Result<&'c str> {
    let n: usize = number_arg(m, "chunk")?;
    if chunks.is_empty() {
        bail!("no text could be extracted from the PDF");
    }
    match n.checked_sub(1).and_then(|i| chunks.get(i)) {
        Some(c) => Ok(c.as_str()),
        None => Err(format!("chunk {} does not exist (the PDF has {} chunks)", n, chunks.len()).into()),
    }
}

/// The `plan` subcommand logic.
fn plan(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let topics: Vec<String> = match m.value_of("file") {
        Some(filename) => {
            let f = File::open(filename)
                .chain_err(|| ErrorKind::Persistence(format!("could not open file {}", filename)))?;
            plan::read_topics(f).chain_err(|| "could not read topics")?
        }
        None => m.values_of("TOPIC").map(|v| v.map(String::from).collect()).unwrap_or_default(),
    };

    let mut options = PlanOptions::default()
        .gap_days(number_arg(m, "gap")?)
        .include_revision(!m.is_present("no-revision"))
        .skip_weekends(!m.is_present("include-weekends"));
    if let Some(start) = m.value_of("start") {
        let date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .chain_err(|| ErrorKind::InvalidInput(format!("invalid date '{}'", start)))?;
        options = options.start_date(date);
    }

    let output = match m.value_of("output") {
        Some(o) => PathBuf::from(o),
        None => files::plan_path(m.value_of("name").unwrap_or(files::DEFAULT_PLAN_NAME))?,
    };

    let plan = plan::make_plan(&topics, &options, &output).chain_err(|| "could not make plan")?;
    print_plan(&plan, style_set);
    styleln!(style_set.normal, "Saved plan to {}", output.display());
    Ok(())
}

/// The `show` subcommand logic.
fn show(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let name = m.value_of("PLAN").unwrap_or_default();
    let plan = files::read_plan(name).chain_err(|| "could not read plan")?;

    styleln!(style_set.title, "{}", name);
    print_plan(&plan, style_set);
    Ok(())
}

/// The `list` subcommand logic
fn list(style_set: &StyleSet) -> Result<()> {
    let plans = match files::plans() {
        Ok(p) => p,
        Err(Error(ErrorKind::NoPlansDirectory, _)) => {
            styleln!(style_set.normal,
                     "No plans have been saved yet. To make one, use `studyplan plan` or run \
                      `studyplan help plan` for help.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // Keeps track of how many read failures we've had
    let mut failures = 0;
    let mut count = 0;

    for (name, plan) in plans {
        match plan {
            Ok(p) => {
                count += 1;
                let span = match p.span() {
                    Some((first, last)) => format!("{} to {}", first, last),
                    None => "empty".to_owned(),
                };
                println!("{} {}",
                         style!(style_set.title, "{}", name),
                         style!(style_set.normal, "({} topics, {})", p.len(), span));
            }
            Err(_) => failures += 1,
        }
    }

    if count == 0 && failures == 0 {
        styleln!(style_set.normal,
                 "No plans are saved; you can make one by running `studyplan plan`");
    }

    // Output any failures
    match failures {
        0 => {}
        1 => styleln!(style_set.error, "{}", "1 plan could not be read"),
        n => styleln!(style_set.error, "{} plans could not be read", n),
    }

    Ok(())
}

/// The `remove` subcommand logic
fn remove(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let name = m.value_of("PLAN").unwrap_or_default();

    files::remove_plan(name).chain_err(|| "could not remove plan")?;

    styleln!(style_set.normal, "Removed plan {}", name);
    Ok(())
}

/// The `extract` subcommand logic.
fn extract(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let chunks = read_chunks(m)?;

    styleln!(style_set.normal, "Extracted {} chunks", chunks.len());
    for (n, chunk) in chunks.iter().enumerate() {
        println!();
        styleln!(style_set.title, "Chunk {}", n + 1);
        styleln!(style_set.description, "{}", chunk);
    }
    Ok(())
}

/// The `flashcards` subcommand logic.
fn flashcards(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let service = card_service(m)?;
    let chunks = read_chunks(m)?;
    let chunk = selected_chunk(m, &chunks)?;

    print_flashcards(&cards::flashcards_or_sentinel(&service, chunk), style_set);
    Ok(())
}

/// The `quiz` subcommand logic.
fn quiz(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let service = card_service(m)?;
    let chunks = read_chunks(m)?;
    let chunk = selected_chunk(m, &chunks)?;
    let title = m.value_of("title").unwrap_or_default();

    print_quiz(&cards::quiz_or_sentinel(&service, chunk, title), style_set);
    Ok(())
}

/// The `study` subcommand logic: everything at once, for the first chunk.
fn study(m: &ArgMatches, style_set: &StyleSet) -> Result<()> {
    let service = card_service(m)?;
    let chunks = read_chunks(m)?;
    styleln!(style_set.normal, "Extracted {} sections", chunks.len());
    let chunk = match chunks.first() {
        Some(c) => c,
        None => return Err("no text could be extracted from the PDF".into()),
    };

    println!();
    styleln!(style_set.title, "Flashcards");
    print_flashcards(&cards::flashcards_or_sentinel(&service, chunk), style_set);

    println!();
    styleln!(style_set.title, "Quiz");
    print_quiz(&cards::quiz_or_sentinel(&service, chunk, "Study Notes"), style_set);

    let topics: Vec<String> = match m.values_of("topic") {
        Some(v) => v.map(String::from).collect(),
        None => (1..4).map(|n| format!("Topic {}", n)).collect(),
    };
    let output = files::plan_path(files::DEFAULT_PLAN_NAME)?;
    let plan = plan::make_plan(&topics, &PlanOptions::default(), &output)
        .chain_err(|| "could not make plan")?;

    println!();
    styleln!(style_set.title, "Planner");
    print_plan(&plan, style_set);
    Ok(())
}

fn print_plan(plan: &SchedulePlan, style_set: &StyleSet) {
    for entry in plan.entries() {
        println!("{} {}",
                 style!(style_set.date, "{}", entry.study_on().format("%a %Y-%m-%d")),
                 style!(style_set.title, "{}", entry.topic()));
        if !entry.reviews().is_empty() {
            let reviews: Vec<String> =
                entry.reviews().iter().map(|d| d.format("%a %Y-%m-%d").to_string()).collect();
            styleln!(style_set.description, "{:15} review on {}", "", reviews.join(", "));
        }
    }
}

fn print_flashcards(cards: &[cards::Flashcard], style_set: &StyleSet) {
    for card in cards {
        println!("{} {}",
                 style!(style_set.normal, "Q:"),
                 style!(style_set.title, "{}", card.question));
        println!("{} {}",
                 style!(style_set.normal, "A:"),
                 style!(style_set.description, "{}", card.answer));
        println!();
    }
}

fn print_quiz(quiz: &[cards::QuizQuestion], style_set: &StyleSet) {
    for (n, q) in quiz.iter().enumerate() {
        styleln!(style_set.title, "{}. {}", n + 1, q.question);
        for option in &q.options {
            styleln!(style_set.normal, "   - {}", option);
        }
        styleln!(style_set.description, "   Answer: {}", q.answer);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap_matches(value: &str) -> ArgMatches<'static> {
        App::new("studyplan")
            .arg(Arg::with_name("gap")
                .long("gap")
                .takes_value(true))
            .get_matches_from(vec!["studyplan", "--gap", value])
    }

    #[test]
    fn gap_is_parsed() {
        let gap: u32 = number_arg(&gap_matches("3"), "gap").unwrap();
        assert_eq!(gap, 3);
    }

    #[test]
    fn oversized_gap_is_rejected() {
        for value in &["4294967296", "4294967298", "two"] {
            match number_arg::<u32>(&gap_matches(value), "gap") {
                Err(Error(ErrorKind::InvalidInput(_), _)) => {}
                other => panic!("expected invalid input for {}, got {:?}", value, other),
            }
        }
    }
}
