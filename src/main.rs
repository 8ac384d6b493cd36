use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use mongodb::{bson::doc, options::ClientOptions, Client};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod db;
mod models;
mod normalize;
mod plant_api;
mod reminders;
mod schedule;
mod search;
mod store;

use cli::{Cli, Commands, SaveArgs};
use config::Config;
use db::{LocalPlants, MongoPlants, PlantCollection};
use models::{Plant, PlantSearchResult, Reminder};
use plant_api::{CachedImageProvider, ImageProvider, PerenualClient, PlantSearchProvider, WikipediaImages};
use reminders::{reschedule_for, LocalReminders, ReminderScheduler};
use schedule::{sort_by_urgency, urgency_of, Named};
use search::{load_popular, suggest, SearchSession};
use store::{FileStore, KeyValueStore, LAST_USER_KEY};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let cli = Cli::parse();

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.store_path())?);
    let user = resolve_user(cli.user, store.as_ref())?;

    let provider: Arc<dyn PlantSearchProvider> = Arc::new(PerenualClient::new(
        &config.plant_api_url,
        config.perenual_key.clone(),
        config.http_timeout,
    )?);
    let images = CachedImageProvider::new(
        WikipediaImages::new(&config.wikipedia_api_url, config.http_timeout)?,
        store.clone(),
    );
    let reminders = LocalReminders::new(store.clone());

    match cli.command {
        Commands::Search { query } => {
            let results = match provider.search(&query).await {
                Ok(results) => results,
                Err(e) => {
                    eprintln!("Error al buscar plantas: {}", e);
                    return Err(e.into());
                }
            };
            print_results(&results);
        }
        Commands::Suggest { query } => {
            for name in suggest(provider.as_ref(), &query).await? {
                println!("{}", name);
            }
        }
        Commands::Explore => explore(provider).await?,
        Commands::Common => {
            let popular = match load_popular(provider.as_ref()).await {
                Ok(popular) => popular,
                Err(e) => {
                    eprintln!("Error al cargar plantas populares: {}", e);
                    return Err(e.into());
                }
            };
            print_results(&popular);
        }
        Commands::Show { id } => match provider.get_by_id(&id).await? {
            Some(plant) => {
                let image = resolve_image(&plant, &images).await;
                print_details(&plant, image.as_deref());
            }
            None => println!("No se encontró planta con ID {}", id),
        },
        Commands::Save(args) => {
            let Some(result) = find_to_save(provider.as_ref(), &args).await? else {
                println!("No se encontraron plantas");
                return Ok(());
            };
            let image = resolve_image(&result, &images).await;
            let plant = Plant::from_search(&result, image);
            let name = plant.name.clone();
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            let inserted_id = plants.add(plant).await?;
            println!("Planta '{}' guardada, ID: {}", name, inserted_id);
        }
        Commands::Add(args) => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            let inserted_id = plants
                .add(Plant::manual(args.name, args.species, args.interval))
                .await?;
            println!("Planta agregada, ID: {}", inserted_id);
        }
        Commands::List { ids } => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            let saved = plants.list().await?;
            if saved.is_empty() {
                println!("No tienes plantas guardadas todavía");
            }
            for plant in saved {
                if ids {
                    println!("{}, '{}'", plant.id.unwrap_or_default(), plant.name);
                } else {
                    print_saved(&plant);
                }
            }
        }
        Commands::Schedule => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            let now = Utc::now();
            let saved = sort_by_urgency(plants.list().await?, now);
            if saved.is_empty() {
                println!("No tienes plantas guardadas. Guarda una para ver su calendario de riego.");
            }
            for plant in saved {
                println!(
                    "{:<28} {:<24} {}",
                    plant.name,
                    urgency_of(&plant, now).to_string(),
                    plant.id.unwrap_or_default()
                );
            }
        }
        Commands::Water { id } => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            if !plants.mark_watered(&id, Utc::now()).await? {
                println!("No se encontró planta con ID {}", id);
                return Ok(());
            }
            refresh_reminder(plants.as_ref(), &reminders, &id).await?;
            println!("Planta ID {} regada", id);
        }
        Commands::SetInterval { id, days } => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            if !plants.set_interval(&id, days).await? {
                println!("No se encontró planta con ID {}", id);
                return Ok(());
            }
            refresh_reminder(plants.as_ref(), &reminders, &id).await?;
            println!("Planta ID {} actualizada: regar cada {} días", id, days);
        }
        Commands::Remove { id } => {
            let plants = open_plants(&config, user.as_deref(), store.clone()).await?;
            if let Some(reminder_id) = plants.get(&id).await?.and_then(|p| p.reminder_id) {
                reminders.cancel(&reminder_id)?;
            }
            if plants.remove(&id).await? {
                println!("Planta ID {} removida", id);
            } else {
                println!("No se encontró planta con ID {}", id);
            }
        }
        Commands::Reminders { due } => {
            let list = if due { reminders.take_due(Utc::now())? } else { reminders.list()? };
            if list.is_empty() {
                println!("Sin recordatorios");
            }
            for reminder in list {
                print_reminder(&reminder);
            }
        }
    }

    Ok(())
}

/// An explicit user wins and is remembered; otherwise the last one used.
fn resolve_user(explicit: Option<String>, store: &dyn KeyValueStore) -> Result<Option<String>> {
    match explicit.filter(|u| !u.trim().is_empty()) {
        Some(user) => {
            store.set(LAST_USER_KEY, &user)?;
            Ok(Some(user))
        }
        None => Ok(store.get(LAST_USER_KEY)?),
    }
}

async fn open_plants(
    config: &Config,
    user: Option<&str>,
    store: Arc<dyn KeyValueStore>,
) -> Result<Box<dyn PlantCollection>> {
    let Some(user) = user else {
        tracing::info!("sin usuario, usando plantas locales");
        return Ok(Box::new(LocalPlants::new(store)));
    };

    // Connect to MongoDB:
    let mut client_options = match ClientOptions::parse(&config.mongo_uri).await {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error al parsear URI de MongoDB: {}", e);
            return Err(e.into());
        }
    };
    client_options.server_selection_timeout = Some(Duration::from_secs(10));

    let client = match Client::with_options(client_options) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error al crear cliente MongoDB: {}", e);
            return Err(e.into());
        }
    };

    let db = client.database(&config.mongo_db);
    if let Err(e) = db.run_command(doc! { "ping": 1 }).await {
        eprintln!("Error al conectar con MongoDB (ping fallido): {}", e);
        return Err(e.into());
    }

    Ok(Box::new(MongoPlants::new(&db, user.to_string())))
}

async fn find_to_save(provider: &dyn PlantSearchProvider, args: &SaveArgs) -> Result<Option<PlantSearchResult>> {
    match (&args.id, &args.query) {
        (Some(id), _) => Ok(provider.get_by_id(id).await?),
        (None, Some(query)) => Ok(provider.search(query).await?.into_iter().next()),
        (None, None) => Ok(None),
    }
}

async fn resolve_image(plant: &PlantSearchResult, images: &dyn ImageProvider) -> Option<String> {
    match &plant.image_url {
        Some(url) => Some(url.clone()),
        None => images.lookup(plant.display_name()).await,
    }
}

async fn refresh_reminder(plants: &dyn PlantCollection, reminders: &dyn ReminderScheduler, id: &str) -> Result<()> {
    if let Some(plant) = plants.get(id).await? {
        let reminder_id = reschedule_for(reminders, &plant)?;
        plants.set_reminder(id, reminder_id).await?;
    }
    Ok(())
}

/// Reads one query per line. Each new line supersedes the search still in
/// flight, so only the latest query prints its results.
async fn explore(provider: Arc<dyn PlantSearchProvider>) -> Result<()> {
    let session = SearchSession::new(provider);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = None;

    while let Some(line) = lines.next_line().await? {
        let query = line.trim().to_string();
        if query.is_empty() {
            continue;
        }
        let search = session.submit_with(&query, {
            let query = query.clone();
            move |result| match result {
                Ok(results) => {
                    println!("== {}", query);
                    print_results(&results);
                }
                Err(e) => eprintln!("Error al buscar '{}': {}", query, e),
            }
        });
        last = Some(tokio::spawn(search));
    }

    if let Some(handle) = last {
        handle.await?;
    }
    session.close();
    Ok(())
}

fn print_results(results: &[PlantSearchResult]) {
    if results.is_empty() {
        println!("No se encontraron plantas");
        return;
    }
    for plant in results {
        let status = match plant.suggested_interval_days() {
            Some(days) => format!("~ cada {} días", days),
            None => plant.watering.clone().unwrap_or_else(|| "—".to_string()),
        };
        println!(
            "{}, '{}' ({}) {}",
            plant.id,
            plant.display_name(),
            plant.scientific_name.as_deref().unwrap_or("—"),
            status
        );
    }
}

fn print_details(plant: &PlantSearchResult, image: Option<&str>) {
    println!("Nombre: '{}'", plant.display_name());
    for (label, value) in detail_rows(plant, image) {
        println!("{}: {}", label, value);
    }
}

/// Labelled detail lines for `show`; missing fields are skipped.
fn detail_rows(plant: &PlantSearchResult, image: Option<&str>) -> Vec<(&'static str, String)> {
    let joined = |items: &[String]| (!items.is_empty()).then(|| items.join(", "));
    let rows = [
        ("Nombre científico", plant.scientific_name.clone()),
        ("Otros nombres", joined(&plant.other_names)),
        ("Imagen", image.map(str::to_string)),
        ("Riego", plant.watering.clone()),
        (
            "Intervalo sugerido",
            plant.suggested_interval_days().map(|d| format!("~ cada {} días", d)),
        ),
        ("Humedad", plant.humidity.clone()),
        ("Luz", joined(&plant.sunlight)),
        ("Cuidado", plant.care_level.clone()),
        ("Toxicidad", plant.toxicity.clone()),
        ("Crecimiento", plant.growth_rate.clone()),
        ("Ciclo", plant.cycle.clone()),
        ("Familia", plant.family.clone()),
        ("Origen", plant.origin.clone()),
        ("Usos", plant.uses.clone()),
        ("Suelo", plant.soil.clone()),
        ("Propagación", plant.propagation.clone()),
        ("Descripción", plant.description.clone()),
    ];
    rows.into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect()
}

fn print_saved(plant: &Plant) {
    println!(
        "Name: '{}'\nEspecie: '{}'\nRiego: {}\nÚltimo riego: {}\nID: '{}',",
        plant.name,
        plant.species.as_deref().unwrap_or("—"),
        plant
            .watering_interval_days
            .map(|d| format!("cada {} días", d))
            .unwrap_or_else(|| "sin intervalo".to_string()),
        plant
            .last_watered_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "nunca".to_string()),
        plant.id.unwrap_or_default(),
    );
    println!();
}

fn print_reminder(reminder: &Reminder) {
    println!(
        "{}  {}: {}  ({})",
        reminder.fire_at.to_rfc3339(),
        reminder.title,
        reminder.body,
        reminder.id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    #[test]
    fn explicit_user_is_remembered() {
        let store = MemoryStore::default();
        assert_eq!(resolve_user(None, &store).unwrap(), None);
        assert_eq!(resolve_user(Some("ana".into()), &store).unwrap().as_deref(), Some("ana"));
        assert_eq!(resolve_user(None, &store).unwrap().as_deref(), Some("ana"));
        assert_eq!(resolve_user(Some("  ".into()), &store).unwrap().as_deref(), Some("ana"));
    }

    #[test]
    fn details_show_every_parsed_field() {
        let plant = PlantSearchResult {
            id: "1".into(),
            common_name: Some("Monstera".into()),
            other_names: vec!["Swiss cheese plant".into(), "Split-leaf".into()],
            watering: Some("Average".into()),
            sunlight: vec!["part shade".into()],
            toxicity: Some("Toxic to pets".into()),
            growth_rate: Some("High".into()),
            cycle: Some("Perennial".into()),
            origin: Some("Mexico".into()),
            uses: Some("Ornamental".into()),
            soil: Some("Loam".into()),
            propagation: Some("Cuttings".into()),
            ..Default::default()
        };
        let rows = detail_rows(&plant, Some("https://img/monstera.jpg"));
        let value = |label: &str| rows.iter().find(|(l, _)| *l == label).map(|(_, v)| v.as_str());

        assert_eq!(value("Otros nombres"), Some("Swiss cheese plant, Split-leaf"));
        assert_eq!(value("Imagen"), Some("https://img/monstera.jpg"));
        assert_eq!(value("Intervalo sugerido"), Some("~ cada 5 días"));
        assert_eq!(value("Luz"), Some("part shade"));
        assert_eq!(value("Toxicidad"), Some("Toxic to pets"));
        assert_eq!(value("Crecimiento"), Some("High"));
        assert_eq!(value("Ciclo"), Some("Perennial"));
        assert_eq!(value("Origen"), Some("Mexico"));
        assert_eq!(value("Usos"), Some("Ornamental"));
        assert_eq!(value("Suelo"), Some("Loam"));
        assert_eq!(value("Propagación"), Some("Cuttings"));
        assert_eq!(value("Humedad"), None);
        assert_eq!(value("Descripción"), None);
    }

    #[tokio::test]
    async fn find_to_save_by_query_takes_first_hit() {
        let provider = search::tests::FakeProvider::default().with("fern", &[Some("Boston Fern"), Some("Holly Fern")]);
        let args = SaveArgs { id: None, query: Some("fern".into()) };
        let found = find_to_save(&provider, &args).await.unwrap().unwrap();
        assert_eq!(found.display_name(), "Boston Fern");

        let args = SaveArgs { id: Some("fern-1".into()), query: None };
        let found = find_to_save(&provider, &args).await.unwrap().unwrap();
        assert_eq!(found.display_name(), "Holly Fern");
    }

    #[tokio::test]
    async fn watering_refreshes_reminder() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let plants = LocalPlants::new(store.clone());
        let reminders = LocalReminders::new(store);

        let id = plants.add(Plant::manual("Pothos".into(), None, Some(7))).await.unwrap().to_hex();
        plants.mark_watered(&id, Utc::now()).await.unwrap();
        refresh_reminder(&plants, &reminders, &id).await.unwrap();

        let saved = plants.get(&id).await.unwrap().unwrap();
        let scheduled = reminders.list().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(saved.reminder_id.as_deref(), Some(scheduled[0].id.as_str()));
        assert_eq!(scheduled[0].title, "🌿 Pothos");
    }
}
