use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// base_url / WIF秘密鍵 / 手数料設定を記述したJSONファイルへのパス
    #[clap(short, long, value_parser, default_value = "config.json")]
    pub config: PathBuf,

    /// 受取先リスト (address / amount の配列) のJSONファイルへのパス
    #[clap(short, long, value_parser, default_value = "wallet.json")]
    pub recipients: PathBuf,

    /// 確認プロンプトを省略してブロードキャストを承認する (自動実行向け)
    #[clap(short, long, action)]
    pub yes: bool,
}
