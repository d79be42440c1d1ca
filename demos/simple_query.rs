// File: demos/simple_query.rs
use sybase_rust::{errors::Result, Cell, DbLibExtension, MessageHandler, Sybase};

fn main() -> Result<()> {
    println!("Starting the application");

    let mut sybase = Sybase::new(DbLibExtension::from_env()?);
    println!("DB-Library initialized");

    // Print informational server messages instead of recording them as errors
    sybase.set_message_handler(
        MessageHandler::new(|message| {
            println!("Server message {}: {}", message.number, message.text);
            message.severity < 11
        }),
        None,
    )?;

    // Connect to the database
    let link = sybase
        .connect(Some("MYSERVER"), Some("username"), Some("password"), None, None, None)?
        .as_link();
    println!("Connected successfully");

    sybase.select_db("pubs2", link)?;

    // Run a simple query
    let value = sybase.query("select au_id, au_lname, au_fname from authors", link)?;
    let Some(result_id) = value.as_result() else {
        println!("Query returned no columns");
        return Ok(());
    };

    // Skip the first row
    sybase.data_seek(result_id, 1)?;

    if let Some(result) = sybase.native_mut().result_mut(result_id) {
        println!("Fetching results:");
        let mut row_count = 0;
        while let Some(row) = result.fetch_row() {
            row_count += 1;
            if row_count <= 5 {
                // Print only the first 5 rows
                let texts: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        Cell::Text(text) => text.clone(),
                        other => format!("{:?}", other),
                    })
                    .collect();
                println!("Row {}: {:?}", row_count, texts);
            }
        }
        println!("Total rows fetched: {}", row_count);
    }

    sybase.free_result(result_id)?;
    sybase.close(link)?;
    Ok(())
}
