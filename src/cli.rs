use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "plantitas")]
#[command(about = "Una CLI para buscar plantas, guardarlas y no olvidar regarlas")]
pub struct Cli {
    /// Usuario dueño de las plantas guardadas (se recuerda para la próxima vez)
    #[arg(long, global = true, env = "PLANTITAS_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Buscar plantas en el catálogo
    Search {
        query: String,
    },
    /// Sugerencias de nombres mientras escribes
    Suggest {
        query: String,
    },
    /// Búsqueda interactiva: una consulta por línea, gana la última
    Explore,
    /// Plantas de interior populares
    Common,
    /// Ver el detalle de una planta del catálogo
    Show {
        /// ID del proveedor
        #[arg(long)]
        id: String,
    },
    /// Guardar una planta del catálogo
    Save(SaveArgs),
    /// Agregar una planta a mano
    Add(AddArgs),
    /// Ver plantas guardadas
    List {
        #[arg(long = "ids")]
        ids: bool,
    },
    /// Calendario de riego, lo más urgente primero
    Schedule,
    /// Marcar planta como regada
    Water {
        /// ID de la planta (ObjectId)
        #[arg(long)]
        id: String,
    },
    /// Cambiar el intervalo de riego
    SetInterval {
        /// ID de la planta (ObjectId)
        #[arg(long)]
        id: String,
        /// Días entre riegos
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },
    /// Remover planta
    Remove {
        /// ID de la planta a remover (ObjectId)
        #[arg(long)]
        id: String,
    },
    /// Ver recordatorios de riego
    Reminders {
        /// Solo los que ya tocan (y se descartan al mostrarlos)
        #[arg(long)]
        due: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SaveArgs {
    /// ID del proveedor
    #[arg(long)]
    pub id: Option<String>,
    /// Guardar el primer resultado de esta búsqueda
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Nombre de la planta
    #[arg(short = 'n', long = "name")]
    pub name: String,
    /// Especie de la planta
    #[arg(short = 's', long = "species")]
    pub species: Option<String>,
    /// Días entre riegos
    #[arg(short = 'i', long = "interval", value_parser = clap::value_parser!(u32).range(1..))]
    pub interval: Option<u32>,
}
