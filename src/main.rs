use std::{path::Path, process::ExitCode, sync::Arc};

use bookdb::{
    config::{CliArgs, Command, Config},
    filter::parse_filter,
    standard_registry, HandlerRegistry, Session,
};
use bookdb_core::{BackendError, Book, Entity, Instance};
use bookdb_sqlite::check_sqlite_file;
use clap::Parser;
use prettytable::{row, Table};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_logging(&config);

    let registry = match standard_registry() {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config, registry) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error ({:?}): {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn open(
    registry: &Arc<HandlerRegistry>,
    config: &Config,
    locator: &str,
    create: bool,
) -> Result<Session, BackendError> {
    let mut session = Session::new(registry.clone()).with_connections(config.connections.clone());
    session.begin(locator, create || config.session.create_if_missing)?;
    Ok(session)
}

fn run(command: Command, config: &Config, registry: Arc<HandlerRegistry>) -> Result<(), BackendError> {
    match command {
        Command::Check { path } => {
            let accepted = check_sqlite_file(Path::new(&path));
            println!("{}: {}", path, if accepted { "accepted" } else { "rejected" });
        }
        Command::Init { locator } => {
            let mut session = open(&registry, config, &locator, true)?;
            session.load()?;
            let report = session.sync_all()?;
            println!("initialized {} ({} objects)", locator, report.objects_saved);
            session.end();
        }
        Command::Tables { locator } => {
            let mut session = open(&registry, config, &locator, false)?;
            let mut table = Table::new();
            table.add_row(row!["table", "columns", "rows"]);
            for name in session.schema().table_names() {
                let columns = session.schema().columns(name).map(|c| c.len()).unwrap_or(0);
                let rows = session.store()?.count_rows(name)?;
                table.add_row(row![name, columns, rows]);
            }
            table.printstd();
            session.end();
        }
        Command::Query {
            locator,
            type_tag,
            filter,
            explain,
        } => {
            let expr = parse_filter(filter.as_deref().unwrap_or(""))
                .map_err(|e| BackendError::BadQuery(e.to_string()))?;
            let mut session = open(&registry, config, &locator, false)?;
            let query = session.compile_query(&type_tag, &expr);
            if explain {
                println!("{}", query.sql());
            } else {
                session.attach(Book::empty(Uuid::new_v4()))?;
                let found = session.run_query(&query)?;
                print_instances(&session, &found);
            }
            session.free_query(query);
            session.end();
        }
        Command::SaveAs { from, to } => {
            let mut source = open(&registry, config, &from, false)?;
            source.load()?;
            let book = source.detach().ok_or(BackendError::NoBook)?;
            source.end();

            let mut target = open(&registry, config, &to, true)?;
            target.attach(book)?;
            let report = target.sync_all()?;
            println!(
                "saved {} objects to {} ({} tables replaced, {} failures)",
                report.objects_saved, to, report.tables_dropped, report.failures
            );
            target.end();
        }
    }
    Ok(())
}

fn summary(instance: &Instance) -> String {
    match instance.entity() {
        Entity::Book(r) => format!("root {}", r.root_account),
        Entity::Commodity(c) => format!("{}:{}", c.namespace, c.mnemonic),
        Entity::Account(a) => format!("{} ({})", a.name, a.account_type.as_str()),
        Entity::Transaction(t) => format!("{} {} [{} splits]", t.post_date, t.description, t.splits.len()),
        Entity::Price(p) => format!("{} {}", p.date, p.value),
        Entity::Budget(b) => format!("{} ({} periods)", b.name, b.num_periods),
        Entity::ScheduledTransaction(s) => format!("{} from {} [{} recurrences]", s.name, s.start_date, s.schedule.len()),
    }
}

fn print_instances(session: &Session, guids: &[Uuid]) {
    let Some(book) = session.book() else {
        return;
    };
    let mut table = Table::new();
    table.add_row(row!["guid", "type", "summary"]);
    for guid in guids {
        if let Some(instance) = book.get(guid) {
            table.add_row(row![guid, instance.type_tag(), summary(instance)]);
        }
    }
    table.printstd();
    println!("{} row(s)", guids.len());
}
