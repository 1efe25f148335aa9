use serde::Deserialize;

/// `aws ec2 describe-images --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AwsDescribeImages {
    #[serde(default)]
    pub images: Vec<AwsImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AwsImage {
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub architecture: String,
}

/// One element of `gcloud compute images list --format=json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GcpImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub self_link: String,
    #[serde(default)]
    pub creation_timestamp: String,
    #[serde(default)]
    pub architecture: Option<String>,
}

/// One element of `az vm image list --output json`.
#[derive(Debug, Deserialize)]
pub(crate) struct AzureImage {
    #[serde(default)]
    pub urn: String,
    #[serde(default)]
    pub offer: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub architecture: Option<String>,
}
