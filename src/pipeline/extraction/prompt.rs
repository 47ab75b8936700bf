/// System instruction sent with every table extraction.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a specialized OCR and data extraction assistant with expertise in transcribing \
handwritten tabular data. Your goal is to convert visual table data into structured text \
with complete accuracy.

Rules:
1. Analyze the provided image carefully. Identify the rows and columns of the handwritten table.
2. Extract the text from each cell.
3. Maintain the structural integrity of the table.
4. The first row of the output must correspond to the table headers found in the image.
5. If a cell appears empty, represent it as an empty string.
6. Do not hallucinate data. If a word is illegible, make your best guess based on context, \
or leave it empty if it is completely unreadable.
7. Return the data strictly as a JSON array of arrays of strings.
   - The outer array represents rows.
   - The inner arrays represent cells within that row.
   - Output raw JSON only. Do NOT wrap it in markdown code blocks.";

/// Default task instruction for a single table image.
pub const DEFAULT_TASK_INSTRUCTION: &str =
    "Extract the handwritten tabular data from this image into a structured 2D array JSON format.";

/// Sampling temperature for extraction. Low for reproducible transcription.
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// JSON schema of the expected response: rows of string cells, headers first.
pub fn table_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "description": "A 2D array representing the table. The first array contains headers, subsequent arrays contain row data.",
        "items": {
            "type": "array",
            "items": {
                "type": "string",
                "description": "The content of a single cell as a string."
            }
        }
    })
}
