use chrono::NaiveDate;

use crate::models::ChatMessage;

/// Prompt texts are Vietnamese because the assistant serves a Vietnamese
/// tour catalog; the engine never inspects the rendered text beyond
/// handing it to the gateway.
const ROUTING_TEMPLATE: &str = "\
Bạn là một AI phân loại yêu cầu người dùng trong một chatbot du lịch.
Dựa vào câu hỏi cuối cùng của người dùng và lịch sử trò chuyện (nếu có), hãy xác định xem người dùng có đang **yêu cầu tìm kiếm tour du lịch mới** hay không.

Lịch sử trò chuyện (Gần nhất sau cùng):
{chat_history}

Câu hỏi cuối cùng của người dùng: {user_query}

Các dấu hiệu cho thấy người dùng **đang tìm kiếm tour mới**:
- Hỏi về tour đi đến địa điểm cụ thể (ví dụ: \"tìm tour đi Đà Nẵng\", \"có tour nào đi Phú Quốc không?\")
- Đề cập đến thời gian mong muốn đi (ví dụ: \"tour 3 ngày 2 đêm\", \"tour đi vào cuối tuần\", \"tour tháng 7\")
- Đề cập đến ngân sách (ví dụ: \"tìm tour dưới 5 triệu\", \"tour khoảng 3tr\")
- Kết hợp nhiều yếu tố trên.

Các dấu hiệu cho thấy người dùng **KHÔNG tìm kiếm tour mới** (mà là hỏi thông tin khác, hỏi chi tiết tour đã đề cập, hoặc trò chuyện thông thường):
- Hỏi chi tiết về một tour đã được đề cập trước đó (ví dụ: \"lịch trình tour đó thế nào?\", \"giá vé trẻ em tour ABC là bao nhiêu?\")
- Hỏi thông tin chung (ví dụ: \"Đà Nẵng có gì chơi?\", \"thời tiết Sapa?\")
- Chào hỏi, cảm ơn, hoặc các câu nói không liên quan trực tiếp đến việc tìm tour.

Trả về MỘT trong hai lựa chọn sau:
- `search`: Nếu người dùng đang yêu cầu tìm kiếm tour mới.
- `respond`: Nếu người dùng đang hỏi thông tin khác, hỏi chi tiết, hoặc trò chuyện thông thường.

Lựa chọn của bạn: ";

const EXTRACTION_TEMPLATE: &str = "\
Bạn là một trợ lý AI chuyên trích xuất thông tin thực thể (NER) từ câu hỏi của người dùng và trả về dưới dạng JSON. Câu hỏi của người dùng sẽ đi kèm với một danh sách điểm đến được cung cấp, trong đó các điểm đến được liệt kê và phân tách bằng dấu phẩy.

Hôm nay là ngày **{current_date}**. Hãy sử dụng thông tin này để xác định khoảng thời gian cụ thể.

Từ câu hỏi và danh sách điểm đến, hãy trích xuất chỉ các thực thể mà người dùng đề cập đến, bao gồm:

1. Miền: Vùng miền trong Việt Nam. Trả về số tương ứng:
    - `1`: Miền Bắc (Hà Nội, Hạ Long, Sapa, Ninh Bình, Hà Giang, Yên Tử, Lào Cai, Cao Bằng, Bắc Kạn...)
    - `2`: Miền Trung (Đà Nẵng, Hội An, Huế, Quảng Nam...)
    - `3`: Miền Nam (Phú Quốc, Thành phố Hồ Chí Minh, Đồng bằng sông Cửu Long...)
    JSON Key: `region`
2. Địa điểm: Tên tỉnh, thành phố, hoặc địa danh cụ thể. Nếu địa điểm được đề cập có trong danh sách điểm đến, trả về dưới dạng chuẩn hóa như trong danh sách. Nếu không có trong danh sách, trả về `null`. Nếu người dùng nhắc đến nhiều địa điểm, hãy trả về một mảng các địa điểm chuẩn hóa.
    JSON Key: `destination` (string hoặc array of strings)
3. Duration: Khoảng thời gian của chuyến đi. Chuẩn hóa định dạng: ví dụ \"4 ngày 3 đêm\" hoặc \"3 ngày 2 đêm\". Nếu chỉ có số (như \"4\"), hiểu là \"4 ngày\".
    JSON Key: `duration`
4. Thời Gian Chuyến Đi: Bất kỳ đề cập nào đến thời gian muốn đi du lịch, bao gồm ngày cụ thể, khoảng ngày, tháng, mùa, dịp lễ, hoặc các cụm từ tương đối như \"tuần sau\", \"mùa hè\", \"Dịp Tết\".
    Nếu tìm thấy, hãy **tính toán ngày/khoảng ngày cụ thể (dưới dạng \"YYYY-MM-DD\") dựa trên ngày hiện tại ({current_date})**.
    - Trả về `departure_date`: \"YYYY-MM-DD\" nếu là một ngày cụ thể (hoặc tương đương 1 ngày như \"ngày mai\").
    - Trả về `start_date`: \"YYYY-MM-DD\" và `end_date`: \"YYYY-MM-DD\" nếu là một khoảng thời gian (ví dụ: \"tuần sau\", \"mùa hè\", \"từ ngày X đến ngày Y\").
    JSON Key: `time` (object hoặc mảng các object chứa `departure_date` HOẶC `start_date` và `end_date`)
5. Số tiền hoặc khoảng tiền: Trả về dưới dạng chuỗi số hoặc khoảng số.
    - Ví dụ: \"Tôi muốn tour 5 triệu\" -> `budget: \"5000000\"`
    - Ví dụ: \"ngân sách từ 3 đến 5 triệu\" -> `budget: \"3000000-5000000\"`
    JSON Key: `budget`
6. Số người: Trả về dưới dạng số nguyên, khoảng số (ví dụ: \"2-5\"), hoặc điều kiện như \">1\", \">2\".
    - Ví dụ: \"2 người\" -> `number_of_people: 2`
    - Ví dụ: \"tôi và bạn bè\" -> `number_of_people: \">1\"`
    - Ví dụ: \"nhóm từ 2 đến 5 người\" -> `number_of_people: \"2-5\"`
    JSON Key: `number_of_people`

Yêu cầu:
- Trả về kết quả dưới dạng **một JSON object duy nhất** chỉ bao gồm các khóa tương ứng với các thực thể được đề cập trong câu hỏi. Không bao gồm các khóa không được đề cập.
- Đảm bảo định dạng JSON hợp lệ, chính xác, và nhất quán. Không thêm ```json ``` vào đầu hoặc cuối output.
- Không suy luận hoặc thêm thông tin không có trong câu hỏi của người dùng, ngoại trừ việc tính toán ngày cụ thể cho mục 4 và chuẩn hóa địa điểm/duration.

Danh sách điểm đến: \"{locations}\"

Câu hỏi: {question}

JSON Output:
";

const RESPONSE_TEMPLATE: &str = "\
Bạn là một trợ lý du lịch AI thân thiện và hữu ích. Nhiệm vụ của bạn là trả lời câu hỏi của người dùng dựa trên lịch sử trò chuyện và thông tin tìm kiếm được cung cấp (nếu có).

Lịch sử trò chuyện (Gần nhất sau cùng):
{chat_history}

Thông tin tìm kiếm được (nếu có liên quan đến câu hỏi cuối cùng):
{search_results}

Câu hỏi cuối cùng của người dùng: {user_query}

Hướng dẫn trả lời:
1. Dựa vào lịch sử trò chuyện để hiểu ngữ cảnh và các câu hỏi trước đó.
2. Nếu có thông tin tìm kiếm và nó liên quan đến câu hỏi, hãy sử dụng thông tin đó để trả lời. Trình bày rõ ràng: tên tour, thời gian, ngày khởi hành, giá vé (người lớn, trẻ em).
3. **QUAN TRỌNG:** Khi đề cập đến giá vé/giá tour, **luôn luôn** thêm thông tin sau: \"Giá vé này chưa bao gồm vé cho em bé dưới 100cm (thường được miễn phí vé dịch vụ tour, chỉ tính vé máy bay/tàu nếu có và chi phí phát sinh nếu sử dụng dịch vụ riêng).\"
4. Nếu không có thông tin tìm kiếm hoặc nó không liên quan, hãy trả lời tổng quát hoặc yêu cầu người dùng cung cấp thêm chi tiết để tìm kiếm.
5. Nếu không tìm thấy tour nào phù hợp sau khi tìm kiếm, hãy thông báo một cách lịch sự.
6. Giữ giọng văn thân thiện, lịch sự và sử dụng tiếng Việt.
7. Không bịa đặt thông tin không có trong thông tin tìm kiếm hoặc lịch sử trò chuyện.

Câu trả lời của bạn:
";

pub fn render_routing_prompt(history: &[ChatMessage], user_query: &str) -> String {
    ROUTING_TEMPLATE
        .replace("{chat_history}", &render_history(history))
        .replace("{user_query}", user_query)
}

pub fn render_extraction_prompt(
    question: &str,
    reference_date: NaiveDate,
    vocabulary: &[String],
) -> String {
    EXTRACTION_TEMPLATE
        .replace("{current_date}", &reference_date.format("%Y-%m-%d").to_string())
        .replace("{locations}", &vocabulary.join(", "))
        .replace("{question}", question)
}

pub fn render_response_prompt(
    history: &[ChatMessage],
    search_results: &str,
    user_query: &str,
) -> String {
    RESPONSE_TEMPLATE
        .replace("{chat_history}", &render_history(history))
        .replace("{search_results}", search_results)
        .replace("{user_query}", user_query)
}

fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|message| format!("{}: {}", message.role_label(), message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{render_extraction_prompt, render_response_prompt, render_routing_prompt};
    use crate::models::ChatMessage;

    #[test]
    fn routing_prompt_embeds_history_and_query() {
        let history = vec![
            ChatMessage::human("chào bạn"),
            ChatMessage::assistant("Chào bạn, tôi có thể giúp gì?"),
        ];

        let prompt = render_routing_prompt(&history, "tìm tour đi Huế");
        assert!(prompt.contains("human: chào bạn"));
        assert!(prompt.contains("ai: Chào bạn, tôi có thể giúp gì?"));
        assert!(prompt.contains("Câu hỏi cuối cùng của người dùng: tìm tour đi Huế"));
    }

    #[test]
    fn extraction_prompt_embeds_reference_date_and_vocabulary() {
        let reference_date = NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date");
        let vocabulary = vec!["Đà Nẵng".to_string(), "Phú Quốc".to_string()];

        let prompt = render_extraction_prompt("tour đi Đà Nẵng", reference_date, &vocabulary);
        assert!(prompt.contains("**2025-05-01**"));
        assert!(prompt.contains("Đà Nẵng, Phú Quốc"));
        assert!(!prompt.contains("{current_date}"));
    }

    #[test]
    fn response_prompt_carries_search_results_verbatim() {
        let prompt = render_response_prompt(&[], "1. Tour: Huế (ID: 7)", "giá bao nhiêu?");
        assert!(prompt.contains("1. Tour: Huế (ID: 7)"));
    }
}
